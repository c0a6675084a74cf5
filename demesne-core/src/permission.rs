//! The permission engine: layered override resolution.
//!
//! Given an action, the resolved region, the actor's trust tier, and the
//! policy snapshot, walk a fixed chain of overridable layers and return a
//! definite verdict. The layer order is load-bearing; see [`check`].

use demesne_types::{ActionKey, FlagValue, TrustTier, Verdict};

use crate::policy::PolicySnapshot;
use crate::region::Region;

/// Actions a claim's own flags can never take away from Management: owners
/// always build and break in their own space. Everything else (PvP,
/// explosions, ...) honors explicit flags even against the owner.
pub const OWNER_OVERRIDE: [ActionKey; 2] = [ActionKey::Build, ActionKey::Break];

/// Resolve `action` at `region` for an actor holding `trust`.
///
/// `parent` must be the region's parent when it is a subdivision; `trust` is
/// `None` for untrusted actors and environment events with no actor.
///
/// Layer order, first definite answer wins:
/// 1. the policy's force-deny set (server-wide safety rail, owners included);
/// 2. wilderness default, when the region is the open-land sentinel (no
///    flags or trust to consult there);
/// 3. owner override: Management performing one of [`OWNER_OVERRIDE`];
/// 4. the region's explicit flag, then — for a subdivision with no flag of
///    its own — the parent's;
/// 5. the trust gate: allow iff `trust` meets the action's required tier.
///    Actions with no required tier are environment actions; without an
///    explicit flag they deny inside claims.
pub fn check(
    action: ActionKey,
    region: &Region,
    parent: Option<&Region>,
    trust: Option<TrustTier>,
    policy: &PolicySnapshot,
) -> Verdict {
    // 1. Force-deny dominates everything, ownership included.
    if policy.is_force_denied(action) {
        return Verdict::Deny;
    }

    // 2. Open land: no flags, no trust gating, just the configured default.
    if region.is_wilderness() {
        return policy.wilderness_default(action).into();
    }

    // 3. Owners act freely in their own space for build/break.
    if trust == Some(TrustTier::Management) && OWNER_OVERRIDE.contains(&action) {
        return Verdict::Allow;
    }

    // 4. Explicit flags beat the generic trust rules.
    if let Some(value) = explicit_flag(region, parent, action) {
        return value.into();
    }

    // 5. Fall back to the required-tier table.
    match policy.required_tier(action) {
        Some(required) => match trust {
            Some(tier) if tier >= required => Verdict::Allow,
            _ => Verdict::Deny,
        },
        None => Verdict::Deny,
    }
}

/// The explicit flag governing `action` at `region`: the region's own flag,
/// or — for a subdivision with that flag unset — the parent's.
pub fn explicit_flag(
    region: &Region,
    parent: Option<&Region>,
    action: ActionKey,
) -> Option<FlagValue> {
    region.explicit_flag(action).or_else(|| {
        if region.is_subdivision() {
            parent.and_then(|p| p.explicit_flag(action))
        } else {
            None
        }
    })
}
