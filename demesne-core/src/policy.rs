//! Server policy snapshot: force-deny set, wilderness defaults, and the
//! required-trust-tier table.
//!
//! A snapshot is built once (from a YAML file or by the embedding server)
//! and treated as immutable; config reload means building a new snapshot and
//! swapping it into the registry.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use demesne_types::{ActionKey, FlagValue, TrustTier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Failed to read policy file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Immutable policy snapshot consumed by the permission engine and the
/// world indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySnapshot {
    /// Actions denied everywhere, for everyone, regardless of ownership or
    /// per-region flags. The safety rail no claim owner can unset.
    #[serde(default)]
    pub force_denied: BTreeSet<ActionKey>,

    /// Per-action defaults in unclaimed space. Unlisted actions allow.
    #[serde(default)]
    pub wilderness: BTreeMap<ActionKey, FlagValue>,

    /// Overrides of the built-in required-tier table.
    #[serde(default)]
    pub required_tier: BTreeMap<ActionKey, TrustTier>,

    /// Lowest block claims may include.
    #[serde(default = "default_world_floor")]
    pub world_floor: i32,

    /// Highest block claims may include.
    #[serde(default = "default_world_ceiling")]
    pub world_ceiling: i32,
}

fn default_world_floor() -> i32 {
    -64
}

fn default_world_ceiling() -> i32 {
    319
}

impl Default for PolicySnapshot {
    fn default() -> Self {
        Self {
            force_denied: BTreeSet::new(),
            wilderness: BTreeMap::new(),
            required_tier: BTreeMap::new(),
            world_floor: default_world_floor(),
            world_ceiling: default_world_ceiling(),
        }
    }
}

impl PolicySnapshot {
    /// Load a snapshot from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PolicyError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let snapshot = serde_yaml::from_str(&contents)?;
        Ok(snapshot)
    }

    pub fn is_force_denied(&self, action: ActionKey) -> bool {
        self.force_denied.contains(&action)
    }

    /// Default for `action` in open land (most actions allow there).
    pub fn wilderness_default(&self, action: ActionKey) -> FlagValue {
        self.wilderness
            .get(&action)
            .copied()
            .unwrap_or(FlagValue::Allow)
    }

    /// Trust tier required for `action` when no explicit flag resolves it:
    /// the snapshot override if present, otherwise the built-in table.
    pub fn required_tier(&self, action: ActionKey) -> Option<TrustTier> {
        self.required_tier
            .get(&action)
            .copied()
            .or_else(|| action.required_tier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_snapshot() {
        let policy = PolicySnapshot::default();
        assert!(!policy.is_force_denied(ActionKey::Explosion));
        assert_eq!(policy.wilderness_default(ActionKey::Build), FlagValue::Allow);
        assert_eq!(
            policy.required_tier(ActionKey::Break),
            Some(TrustTier::Builder)
        );
        assert_eq!(
            policy.required_tier(ActionKey::OpenContainer),
            Some(TrustTier::Container)
        );
        assert_eq!(policy.required_tier(ActionKey::Explosion), None);
        assert_eq!(policy.world_floor, -64);
        assert_eq!(policy.world_ceiling, 319);
    }

    #[test]
    fn test_from_file_with_partial_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "force_denied: [explosion]\n\
             wilderness:\n  pvp: deny\n\
             required_tier:\n  interact: container\n\
             world_ceiling: 255\n"
        )
        .unwrap();

        let policy = PolicySnapshot::from_file(file.path()).unwrap();
        assert!(policy.is_force_denied(ActionKey::Explosion));
        assert!(!policy.is_force_denied(ActionKey::Pvp));
        assert_eq!(policy.wilderness_default(ActionKey::Pvp), FlagValue::Deny);
        assert_eq!(policy.wilderness_default(ActionKey::Build), FlagValue::Allow);
        // Override beats the built-in table
        assert_eq!(
            policy.required_tier(ActionKey::Interact),
            Some(TrustTier::Container)
        );
        assert_eq!(policy.world_ceiling, 255);
        assert_eq!(policy.world_floor, -64);
    }

    #[test]
    fn test_from_file_rejects_unknown_action() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "force_denied: [teleport]\n").unwrap();
        assert!(matches!(
            PolicySnapshot::from_file(file.path()),
            Err(PolicyError::ParseError(_))
        ));
    }
}
