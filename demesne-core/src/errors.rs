//! Error taxonomy for claim transactions.

use std::sync::Arc;

use demesne_types::{ClaimBox, RegionId, WorldId};
use thiserror::Error;

use crate::region::Region;

#[derive(Debug, Error)]
pub enum ClaimError {
    /// Expected, frequent outcome of create/resize: the candidate overlaps a
    /// sibling region. Carries the blocking region so the caller can report
    /// its owner. Never logged as an error by the core.
    #[error("bounds overlap existing claim {}", .blocking.id)]
    Conflict { blocking: Arc<Region> },

    /// Caller bug: degenerate corners or bounds outside world limits.
    /// Rejected before any mutation; index state unchanged.
    #[error("invalid bounds {bounds:?}: {reason}")]
    InvalidBounds { bounds: ClaimBox, reason: &'static str },

    #[error("unknown world `{0}`")]
    UnknownWorld(WorldId),

    /// The referenced region id is not (or no longer) present. Ids can
    /// legitimately go stale across a session cache's lifetime.
    #[error("unknown region {0}")]
    UnknownRegion(RegionId),

    /// Delete refused: the region still has subdivisions and the caller did
    /// not ask for a cascade.
    #[error("region {region} still has {children} subdivisions; delete requires cascade")]
    NonEmptyParent { region: RegionId, children: usize },

    /// Subdivisions cannot themselves contain subdivisions.
    #[error("region {parent} is itself a subdivision and cannot have children")]
    DepthExceeded { parent: RegionId },

    /// Subdivision bounds must lie fully inside the parent, and a parent
    /// resize must keep every existing subdivision inside.
    #[error("bounds would leave a subdivision outside region {parent}")]
    OutsideParent { parent: RegionId },
}

impl ClaimError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClaimError::Conflict { .. })
    }

    /// The blocking region of a conflict, for caller-side reporting.
    pub fn conflicting_region(&self) -> Option<&Arc<Region>> {
        match self {
            ClaimError::Conflict { blocking } => Some(blocking),
            _ => None,
        }
    }
}
