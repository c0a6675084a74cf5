//! The claim record: one claimed volume with its owner, trust lists, flag
//! overrides, and hierarchy links.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use demesne_types::{
    ActionKey, ActorId, BlockPos, ClaimBox, FlagValue, RegionId, RegionKind, RegionRecord,
    TrustRecord, TrustSubject, TrustTier, WorldId,
};

/// Trust lists of one live region, one set per tier.
///
/// A subject appears in at most one tier; granting a new tier moves it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrustTable {
    accessor: HashSet<TrustSubject>,
    container: HashSet<TrustSubject>,
    builder: HashSet<TrustSubject>,
    management: HashSet<TrustSubject>,
}

impl TrustTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subjects explicitly granted exactly this tier.
    pub fn granted(&self, tier: TrustTier) -> &HashSet<TrustSubject> {
        match tier {
            TrustTier::Accessor => &self.accessor,
            TrustTier::Container => &self.container,
            TrustTier::Builder => &self.builder,
            TrustTier::Management => &self.management,
        }
    }

    /// Grant `tier` to `subject`, replacing any previous grant; `None`
    /// revokes the subject from all tiers.
    pub fn set(&mut self, subject: TrustSubject, tier: Option<TrustTier>) {
        self.accessor.remove(&subject);
        self.container.remove(&subject);
        self.builder.remove(&subject);
        self.management.remove(&subject);
        if let Some(tier) = tier {
            match tier {
                TrustTier::Accessor => self.accessor.insert(subject),
                TrustTier::Container => self.container.insert(subject),
                TrustTier::Builder => self.builder.insert(subject),
                TrustTier::Management => self.management.insert(subject),
            };
        }
    }

    /// The tier explicitly granted to `subject`, if any.
    pub fn tier_of(&self, subject: &TrustSubject) -> Option<TrustTier> {
        if self.management.contains(subject) {
            Some(TrustTier::Management)
        } else if self.builder.contains(subject) {
            Some(TrustTier::Builder)
        } else if self.container.contains(subject) {
            Some(TrustTier::Container)
        } else if self.accessor.contains(subject) {
            Some(TrustTier::Accessor)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.accessor.is_empty()
            && self.container.is_empty()
            && self.builder.is_empty()
            && self.management.is_empty()
    }

    pub fn to_record(&self) -> TrustRecord {
        let sorted = |set: &HashSet<TrustSubject>| {
            let mut v: Vec<TrustSubject> = set.iter().cloned().collect();
            v.sort();
            v
        };
        TrustRecord {
            accessor: sorted(&self.accessor),
            container: sorted(&self.container),
            builder: sorted(&self.builder),
            management: sorted(&self.management),
        }
    }

    pub fn from_record(record: &TrustRecord) -> Self {
        Self {
            accessor: record.accessor.iter().cloned().collect(),
            container: record.container.iter().cloned().collect(),
            builder: record.builder.iter().cloned().collect(),
            management: record.management.iter().cloned().collect(),
        }
    }
}

/// One claimed volume.
///
/// Regions are handed out as `Arc<Region>` and never mutated in place; every
/// edit clones the record, changes the copy, and swaps it into the owning
/// index. Hierarchy links are ids, not references, so deletion can never
/// leave a dangling pointer.
#[derive(Debug, Clone)]
pub struct Region {
    pub id: RegionId,
    pub world: WorldId,
    pub kind: RegionKind,
    /// Corner-normalized, inclusive bounds. For non-cuboid regions the
    /// vertical extent is nominal; containment ignores it.
    pub bounds: ClaimBox,
    /// False = infinite vertical column between the horizontal bounds.
    pub cuboid: bool,
    /// None for admin-owned and wilderness regions.
    pub owner: Option<ActorId>,
    pub parent: Option<RegionId>,
    pub children: Vec<RegionId>,
    pub trust: TrustTable,
    pub flags: BTreeMap<ActionKey, FlagValue>,
    /// Refreshed on owner activity; consumed by an external expiry collaborator.
    pub last_active: DateTime<Utc>,
}

impl Region {
    pub fn new(
        id: RegionId,
        world: WorldId,
        kind: RegionKind,
        bounds: ClaimBox,
        cuboid: bool,
        owner: Option<ActorId>,
        parent: Option<RegionId>,
    ) -> Self {
        Self {
            id,
            world,
            kind,
            bounds,
            cuboid,
            owner,
            parent,
            children: Vec::new(),
            trust: TrustTable::new(),
            flags: BTreeMap::new(),
            last_active: Utc::now(),
        }
    }

    /// The per-world sentinel covering all unclaimed space.
    pub fn wilderness(world: WorldId) -> Self {
        Self::new(
            RegionId::WILDERNESS,
            world,
            RegionKind::Wilderness,
            ClaimBox::new(
                BlockPos::new(i32::MIN, i32::MIN, i32::MIN),
                BlockPos::new(i32::MAX, i32::MAX, i32::MAX),
            ),
            false,
            None,
            None,
        )
    }

    pub fn is_wilderness(&self) -> bool {
        self.kind == RegionKind::Wilderness
    }

    pub fn is_subdivision(&self) -> bool {
        self.parent.is_some()
    }

    /// Top-level regions live in the spatial buckets; subdivisions are found
    /// by descending from their parent.
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none() && !self.is_wilderness()
    }

    /// True when this region covers `pos`. Column regions ignore height;
    /// the wilderness covers everything.
    pub fn contains(&self, pos: BlockPos) -> bool {
        if self.is_wilderness() {
            return true;
        }
        if self.cuboid {
            self.bounds.contains(pos)
        } else {
            self.bounds.contains_column(pos)
        }
    }

    /// The explicit flag override for `action`, if one is set.
    pub fn explicit_flag(&self, action: ActionKey) -> Option<FlagValue> {
        self.flags.get(&action).copied()
    }

    pub fn to_record(&self) -> RegionRecord {
        RegionRecord {
            id: self.id,
            world: self.world.clone(),
            kind: self.kind,
            bounds: self.bounds,
            cuboid: self.cuboid,
            owner: self.owner,
            parent: self.parent,
            trust: self.trust.to_record(),
            flags: self.flags.clone(),
            last_active: self.last_active,
        }
    }

    /// Rebuild a live region from a persisted record. Child links are left
    /// empty; the index restores them as children are replayed.
    pub fn from_record(record: &RegionRecord) -> Self {
        Self {
            id: record.id,
            world: record.world.clone(),
            kind: record.kind,
            bounds: record.bounds,
            cuboid: record.cuboid,
            owner: record.owner,
            parent: record.parent,
            children: Vec::new(),
            trust: TrustTable::from_record(&record.trust),
            flags: record.flags.clone(),
            last_active: record.last_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use demesne_types::GroupId;
    use uuid::Uuid;

    fn actor() -> ActorId {
        ActorId::new(Uuid::new_v4())
    }

    fn basic(bounds: ClaimBox, cuboid: bool) -> Region {
        Region::new(
            RegionId::new(1),
            WorldId::new("overworld"),
            RegionKind::Basic,
            bounds,
            cuboid,
            Some(actor()),
            None,
        )
    }

    #[test]
    fn test_column_containment_ignores_height() {
        let bounds = ClaimBox::new(BlockPos::new(0, 0, 0), BlockPos::new(9, 9, 9));
        let column = basic(bounds, false);
        let cuboid = basic(bounds, true);

        let high = BlockPos::new(5, 200, 5);
        assert!(column.contains(high));
        assert!(!cuboid.contains(high));
        assert!(cuboid.contains(BlockPos::new(5, 9, 5)));
    }

    #[test]
    fn test_wilderness_contains_everything() {
        let w = Region::wilderness(WorldId::new("overworld"));
        assert!(w.contains(BlockPos::new(i32::MAX, -3000, i32::MIN)));
        assert!(w.is_wilderness());
        assert!(!w.is_top_level());
    }

    #[test]
    fn test_trust_table_grant_replaces_previous_tier() {
        let mut table = TrustTable::new();
        let subject = TrustSubject::Actor(actor());

        table.set(subject.clone(), Some(TrustTier::Container));
        assert_eq!(table.tier_of(&subject), Some(TrustTier::Container));

        table.set(subject.clone(), Some(TrustTier::Builder));
        assert_eq!(table.tier_of(&subject), Some(TrustTier::Builder));
        assert!(table.granted(TrustTier::Container).is_empty());

        table.set(subject.clone(), None);
        assert_eq!(table.tier_of(&subject), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_record_round_trip() {
        let mut region = basic(
            ClaimBox::new(BlockPos::new(0, -64, 0), BlockPos::new(31, 319, 31)),
            false,
        );
        region
            .trust
            .set(TrustSubject::Group(GroupId::new("friends")), Some(TrustTier::Builder));
        region.flags.insert(ActionKey::Pvp, FlagValue::Deny);

        let restored = Region::from_record(&region.to_record());
        assert_eq!(restored.id, region.id);
        assert_eq!(restored.bounds, region.bounds);
        assert_eq!(restored.trust, region.trust);
        assert_eq!(restored.flags, region.flags);
        assert_eq!(restored.last_active, region.last_active);
    }
}
