//! Trust and ownership resolution.
//!
//! Pure functions over a region (and its parent, for subdivisions) plus an
//! injected group-membership collaborator. The administrative "claims
//! ignorer" bypass is deliberately not here: callers evaluate it before
//! asking, so the resolver stays pure.

use std::collections::HashSet;

use demesne_types::{ActorId, GroupId, TrustSubject, TrustTier};

use crate::region::Region;

/// Group membership lookups, supplied by the identity collaborator.
pub trait GroupMembership: Send + Sync {
    /// True when `actor` belongs to `group`.
    fn is_member(&self, group: &GroupId, actor: ActorId) -> bool;
}

/// Null implementation: nobody belongs to any group.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGroups;

impl GroupMembership for NoGroups {
    fn is_member(&self, _group: &GroupId, _actor: ActorId) -> bool {
        false
    }
}

const TIERS_TOP_DOWN: [TrustTier; 4] = [
    TrustTier::Management,
    TrustTier::Builder,
    TrustTier::Container,
    TrustTier::Accessor,
];

/// The highest trust tier `actor` holds in `region`.
///
/// The owner is implicitly Management. A subdivision with no explicit grant
/// of its own falls back to its parent's lists: trust inherits downward and
/// is strictly additive, never a restriction of the parent's.
pub fn trust_level(
    region: &Region,
    parent: Option<&Region>,
    actor: ActorId,
    groups: &dyn GroupMembership,
) -> Option<TrustTier> {
    if region.owner == Some(actor) {
        return Some(TrustTier::Management);
    }

    for tier in TIERS_TOP_DOWN {
        if names_actor(region.trust.granted(tier), actor, groups) {
            return Some(tier);
        }
    }

    if region.is_subdivision() {
        if let Some(parent) = parent {
            return trust_level(parent, None, actor, groups);
        }
    }

    None
}

/// Convenience check: does `actor` hold at least `min_tier` in `region`?
pub fn is_trusted(
    region: &Region,
    parent: Option<&Region>,
    actor: ActorId,
    min_tier: TrustTier,
    groups: &dyn GroupMembership,
) -> bool {
    trust_level(region, parent, actor, groups).is_some_and(|tier| tier >= min_tier)
}

fn names_actor(set: &HashSet<TrustSubject>, actor: ActorId, groups: &dyn GroupMembership) -> bool {
    set.iter().any(|subject| match subject {
        TrustSubject::Actor(a) => *a == actor,
        TrustSubject::Group(g) => groups.is_member(g, actor),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use demesne_types::{BlockPos, ClaimBox, RegionId, RegionKind, WorldId};
    use uuid::Uuid;

    struct OneGroup {
        group: GroupId,
        member: ActorId,
    }

    impl GroupMembership for OneGroup {
        fn is_member(&self, group: &GroupId, actor: ActorId) -> bool {
            *group == self.group && actor == self.member
        }
    }

    fn actor() -> ActorId {
        ActorId::new(Uuid::new_v4())
    }

    fn claim(owner: ActorId) -> Region {
        Region::new(
            RegionId::new(1),
            WorldId::new("overworld"),
            RegionKind::Basic,
            ClaimBox::new(BlockPos::new(0, 0, 0), BlockPos::new(31, 31, 31)),
            false,
            Some(owner),
            None,
        )
    }

    fn subdivision_of(parent: &Region) -> Region {
        Region::new(
            RegionId::new(2),
            parent.world.clone(),
            RegionKind::Subdivision,
            ClaimBox::new(BlockPos::new(4, 0, 4), BlockPos::new(12, 31, 12)),
            true,
            parent.owner,
            Some(parent.id),
        )
    }

    #[test]
    fn test_owner_is_implicitly_management() {
        let owner = actor();
        let region = claim(owner);
        assert_eq!(
            trust_level(&region, None, owner, &NoGroups),
            Some(TrustTier::Management)
        );
    }

    #[test]
    fn test_stranger_has_no_trust() {
        let region = claim(actor());
        assert_eq!(trust_level(&region, None, actor(), &NoGroups), None);
    }

    #[test]
    fn test_trust_monotonicity() {
        let owner = actor();
        let friend = actor();
        let mut region = claim(owner);
        region
            .trust
            .set(TrustSubject::Actor(friend), Some(TrustTier::Builder));

        assert_eq!(
            trust_level(&region, None, friend, &NoGroups),
            Some(TrustTier::Builder)
        );
        for tier in [TrustTier::Accessor, TrustTier::Container, TrustTier::Builder] {
            assert!(is_trusted(&region, None, friend, tier, &NoGroups));
        }
        assert!(!is_trusted(
            &region,
            None,
            friend,
            TrustTier::Management,
            &NoGroups
        ));
    }

    #[test]
    fn test_group_grant_resolves_through_collaborator() {
        let member = actor();
        let outsider = actor();
        let groups = OneGroup {
            group: GroupId::new("friends"),
            member,
        };
        let mut region = claim(actor());
        region.trust.set(
            TrustSubject::Group(GroupId::new("friends")),
            Some(TrustTier::Container),
        );

        assert_eq!(
            trust_level(&region, None, member, &groups),
            Some(TrustTier::Container)
        );
        assert_eq!(trust_level(&region, None, outsider, &groups), None);
    }

    #[test]
    fn test_subdivision_inherits_parent_trust() {
        let owner = actor();
        let friend = actor();
        let mut parent = claim(owner);
        parent
            .trust
            .set(TrustSubject::Actor(friend), Some(TrustTier::Builder));
        let sub = subdivision_of(&parent);

        assert_eq!(
            trust_level(&sub, Some(&parent), friend, &NoGroups),
            Some(TrustTier::Builder)
        );
        // The parent's owner is Management of the subdivision too
        assert_eq!(
            trust_level(&sub, Some(&parent), owner, &NoGroups),
            Some(TrustTier::Management)
        );
    }

    #[test]
    fn test_subdivision_trust_is_additive_not_restrictive() {
        let owner = actor();
        let friend = actor();
        let mut parent = claim(owner);
        parent
            .trust
            .set(TrustSubject::Actor(friend), Some(TrustTier::Builder));
        let mut sub = subdivision_of(&parent);
        // An explicit grant in the subdivision stacks on top of the parent's
        sub.trust
            .set(TrustSubject::Actor(friend), Some(TrustTier::Management));

        assert_eq!(
            trust_level(&sub, Some(&parent), friend, &NoGroups),
            Some(TrustTier::Management)
        );
    }
}
