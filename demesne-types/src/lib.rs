//! Shared types for demesne
//!
//! This crate provides the common vocabulary used across the demesne
//! ecosystem: identifiers, block geometry, trust tiers, action keys, and
//! the record/event types exchanged with persistence collaborators.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod geom;

pub use geom::{BlockPos, ChunkPos, ClaimBox, CHUNK_SIZE};

/// World identifier (the host engine's world name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub String);

impl WorldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Region identifier, assigned at creation and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u64);

impl RegionId {
    /// Reserved id of the per-world wilderness sentinel.
    pub const WILDERNESS: Self = Self(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RegionId {
    fn from(id: u64) -> Self {
        RegionId(id)
    }
}

impl From<RegionId> for u64 {
    fn from(id: RegionId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Actor (player) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Group identifier, resolved to members by the identity collaborator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What kind of claim a region is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    /// Per-world sentinel covering all unclaimed space
    Wilderness,
    /// Ordinary player claim
    Basic,
    /// Administrator claim with no individual owner
    Admin,
    /// Child region nested inside a top-level claim
    Subdivision,
    /// Shared settlement claim
    Town,
}

impl RegionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKind::Wilderness => "wilderness",
            RegionKind::Basic => "basic",
            RegionKind::Admin => "admin",
            RegionKind::Subdivision => "subdivision",
            RegionKind::Town => "town",
        }
    }
}

/// Ordered delegation level an owner grants to another actor.
///
/// The ordering is load-bearing: `Accessor < Container < Builder < Management`,
/// and holding a tier implies every tier below it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    Accessor,
    Container,
    Builder,
    Management,
}

impl TrustTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustTier::Accessor => "accessor",
            TrustTier::Container => "container",
            TrustTier::Builder => "builder",
            TrustTier::Management => "management",
        }
    }
}

/// A trust entry: a single actor or an externally-resolved group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustSubject {
    Actor(ActorId),
    Group(GroupId),
}

/// Closed set of permission keys the engine can resolve.
///
/// A closed enumeration instead of string constants: an unknown action is a
/// compile error, not a silent lookup miss.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ActionKey {
    /// Place a block
    Build,
    /// Break a block
    Break,
    /// Open a chest, barrel, furnace, or other inventory holder
    OpenContainer,
    /// Use a door, button, lever, or similar
    Interact,
    /// Damage another player
    Pvp,
    /// Explosion damage to blocks
    Explosion,
    /// Fire ignition and spread
    FireSpread,
    /// Lava or water flowing across the region boundary
    FluidFlow,
}

impl ActionKey {
    pub const ALL: [ActionKey; 8] = [
        ActionKey::Build,
        ActionKey::Break,
        ActionKey::OpenContainer,
        ActionKey::Interact,
        ActionKey::Pvp,
        ActionKey::Explosion,
        ActionKey::FireSpread,
        ActionKey::FluidFlow,
    ];

    /// Trust tier required for this action when no explicit flag resolves it.
    ///
    /// `None` marks environment actions that no trust tier grants: inside a
    /// claim they deny unless an explicit flag allows them.
    pub fn required_tier(&self) -> Option<TrustTier> {
        match self {
            ActionKey::Build | ActionKey::Break => Some(TrustTier::Builder),
            ActionKey::OpenContainer => Some(TrustTier::Container),
            ActionKey::Interact => Some(TrustTier::Accessor),
            ActionKey::Pvp
            | ActionKey::Explosion
            | ActionKey::FireSpread
            | ActionKey::FluidFlow => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKey::Build => "build",
            ActionKey::Break => "break",
            ActionKey::OpenContainer => "open_container",
            ActionKey::Interact => "interact",
            ActionKey::Pvp => "pvp",
            ActionKey::Explosion => "explosion",
            ActionKey::FireSpread => "fire_spread",
            ActionKey::FluidFlow => "fluid_flow",
        }
    }
}

/// Explicit per-region override for one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagValue {
    Allow,
    Deny,
}

/// Final decision of the permission engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

impl From<FlagValue> for Verdict {
    fn from(value: FlagValue) -> Self {
        match value {
            FlagValue::Allow => Verdict::Allow,
            FlagValue::Deny => Verdict::Deny,
        }
    }
}

/// Trust lists of one region, one set per tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRecord {
    #[serde(default)]
    pub accessor: Vec<TrustSubject>,

    #[serde(default)]
    pub container: Vec<TrustSubject>,

    #[serde(default)]
    pub builder: Vec<TrustSubject>,

    #[serde(default)]
    pub management: Vec<TrustSubject>,
}

/// Portable snapshot of one region, exchanged with the persistence
/// collaborator at world load/save time.
///
/// Child links are not recorded; they are rebuilt from `parent` on replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub id: RegionId,
    pub world: WorldId,
    pub kind: RegionKind,
    pub bounds: ClaimBox,
    pub cuboid: bool,

    #[serde(default)]
    pub owner: Option<ActorId>,

    #[serde(default)]
    pub parent: Option<RegionId>,

    #[serde(default)]
    pub trust: TrustRecord,

    #[serde(default)]
    pub flags: BTreeMap<ActionKey, FlagValue>,

    pub last_active: DateTime<Utc>,
}

/// Structural mutation event, delivered to observers after every committed
/// change so the persistence collaborator can write it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegionChange {
    /// A region was created (by a caller or by world-load replay)
    Created { region: RegionId },

    /// A region's bounds were swapped by a successful resize
    Resized {
        region: RegionId,
        old_bounds: ClaimBox,
        new_bounds: ClaimBox,
    },

    /// A region was deleted, along with any cascaded children
    Deleted {
        region: RegionId,
        cascaded: Vec<RegionId>,
    },

    /// Ownership was transferred
    OwnerChanged {
        region: RegionId,
        owner: Option<ActorId>,
    },

    /// A trust entry was granted, changed, or revoked (`None` = revoked)
    TrustChanged {
        region: RegionId,
        subject: TrustSubject,
        tier: Option<TrustTier>,
    },

    /// A flag override was set or cleared (`None` = cleared)
    FlagChanged {
        region: RegionId,
        action: ActionKey,
        value: Option<FlagValue>,
    },

    /// Owner activity was noted (refreshes `last_active`)
    ActivityNoted { region: RegionId },
}

impl RegionChange {
    /// The region the event is about.
    pub fn region(&self) -> RegionId {
        match self {
            RegionChange::Created { region }
            | RegionChange::Resized { region, .. }
            | RegionChange::Deleted { region, .. }
            | RegionChange::OwnerChanged { region, .. }
            | RegionChange::TrustChanged { region, .. }
            | RegionChange::FlagChanged { region, .. }
            | RegionChange::ActivityNoted { region } => *region,
        }
    }
}
