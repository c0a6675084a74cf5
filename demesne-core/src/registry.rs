//! Cross-world registry: the single entry point callers hold.
//!
//! The registry owns one claim index per world (created lazily), the region
//! id allocator, the injected policy snapshot and group-membership
//! collaborator, and the change-observer list. It holds no spatial logic of
//! its own — queries and transactions are routed to the right world index
//! under that world's lock, so no operation ever blocks across worlds.
//!
//! The registry is an explicitly constructed service: the embedding server
//! builds one and hands references to its collaborators. There is no global
//! instance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use demesne_types::{
    ActionKey, ActorId, BlockPos, ClaimBox, FlagValue, RegionChange, RegionId, RegionKind,
    RegionRecord, TrustSubject, TrustTier, Verdict, WorldId,
};
use parking_lot::RwLock;

use crate::errors::ClaimError;
use crate::index::WorldIndex;
use crate::permission;
use crate::policy::PolicySnapshot;
use crate::region::Region;
use crate::session::ActorSession;
use crate::trust::{self, GroupMembership, NoGroups};

/// Persistence-side callback, invoked after every committed mutation.
///
/// Fire-and-forget from the core's perspective: the core does not wait for
/// durability, and observers must not call back into the registry.
pub trait RegionObserver: Send + Sync {
    fn region_changed(&self, world: &WorldId, change: &RegionChange);
}

pub struct Registry {
    policy: RwLock<Arc<PolicySnapshot>>,
    groups: Arc<dyn GroupMembership>,
    worlds: RwLock<HashMap<WorldId, Arc<RwLock<WorldIndex>>>>,
    observers: RwLock<Vec<Arc<dyn RegionObserver>>>,
    next_region_id: AtomicU64,
}

impl Registry {
    pub fn new(policy: PolicySnapshot) -> Self {
        Self::with_groups(policy, Arc::new(NoGroups))
    }

    pub fn with_groups(policy: PolicySnapshot, groups: Arc<dyn GroupMembership>) -> Self {
        Self {
            policy: RwLock::new(Arc::new(policy)),
            groups,
            worlds: RwLock::new(HashMap::new()),
            observers: RwLock::new(Vec::new()),
            next_region_id: AtomicU64::new(1),
        }
    }

    /// The current policy snapshot.
    pub fn policy(&self) -> Arc<PolicySnapshot> {
        self.policy.read().clone()
    }

    /// Swap in a new policy snapshot (config reload). Bumps every world's
    /// generation so verdicts cached against the old snapshot become misses.
    pub fn swap_policy(&self, policy: PolicySnapshot) {
        *self.policy.write() = Arc::new(policy);
        let worlds: Vec<Arc<RwLock<WorldIndex>>> = self.worlds.read().values().cloned().collect();
        for index in worlds {
            index.write().bump_generation();
        }
        tracing::info!("Swapped policy snapshot");
    }

    pub fn add_observer(&self, observer: Arc<dyn RegionObserver>) {
        self.observers.write().push(observer);
    }

    /// The claim index for `world`, created empty on first access. Claim
    /// records for a freshly loaded world arrive via [`Registry::load_world`].
    pub fn world_index(&self, world: &WorldId) -> Arc<RwLock<WorldIndex>> {
        if let Some(index) = self.worlds.read().get(world) {
            return index.clone();
        }
        let mut worlds = self.worlds.write();
        worlds
            .entry(world.clone())
            .or_insert_with(|| {
                tracing::debug!("Initializing claim index for world {}", world);
                let policy = self.policy.read();
                Arc::new(RwLock::new(WorldIndex::new(
                    world.clone(),
                    policy.world_floor,
                    policy.world_ceiling,
                )))
            })
            .clone()
    }

    /// The most specific region at `pos`, or the wilderness sentinel.
    ///
    /// With a session, the last resolved region is tried first: when its
    /// generation stamp is current and it still contains `pos`, the bucket
    /// scan is skipped entirely (the common case of an actor standing still
    /// or walking inside one claim). A wilderness hint is never conclusive.
    pub fn resolve_region(
        &self,
        world: &WorldId,
        pos: BlockPos,
        session: Option<&mut ActorSession>,
    ) -> Arc<Region> {
        let index = self.world_index(world);
        let idx = index.read();
        let generation = idx.generation();

        if let Some(session) = session {
            let hint = session.hint(world).map(|(region, stamp)| (region.clone(), stamp));
            if let Some((hinted, stamp)) = hint {
                if stamp == generation && !hinted.is_wilderness() && hinted.contains(pos) {
                    // A parent hit still has to descend into its children
                    let resolved = if hinted.is_subdivision() {
                        hinted
                    } else {
                        idx.refine(&hinted, pos)
                    };
                    session.remember_region(world.clone(), resolved.clone(), generation);
                    return resolved;
                }
            }
            let resolved = idx.region_at(pos);
            session.remember_region(world.clone(), resolved.clone(), generation);
            return resolved;
        }

        idx.region_at(pos)
    }

    /// Resolve `action` at `region` for `actor` (`None` for environment
    /// events with no acting player). With a session belonging to the same
    /// actor, verdicts are served from and stored into its cache.
    pub fn check_permission(
        &self,
        action: ActionKey,
        region: &Arc<Region>,
        actor: Option<ActorId>,
        mut session: Option<&mut ActorSession>,
    ) -> Verdict {
        let index = self.world_index(&region.world);
        let idx = index.read();
        let generation = idx.generation();

        if let Some(session) = session.as_deref_mut() {
            if actor == Some(session.actor()) {
                if let Some(verdict) = session.cached_verdict(region.id, generation, action) {
                    return verdict;
                }
            }
        }

        let parent = region.parent.and_then(|pid| idx.region(pid).cloned());
        drop(idx);

        let policy = self.policy.read().clone();
        let trust = actor.and_then(|actor| {
            trust::trust_level(region, parent.as_deref(), actor, self.groups.as_ref())
        });
        let verdict = permission::check(action, region, parent.as_deref(), trust, &policy);

        if let Some(session) = session {
            if actor == Some(session.actor()) {
                session.remember_verdict(region.id, generation, action, verdict);
            }
        }
        verdict
    }

    /// The highest trust tier `actor` holds in `region`.
    pub fn trust_level(&self, region: &Region, actor: ActorId) -> Option<TrustTier> {
        let index = self.world_index(&region.world);
        let parent = region
            .parent
            .and_then(|pid| index.read().region(pid).cloned());
        trust::trust_level(region, parent.as_deref(), actor, self.groups.as_ref())
    }

    pub fn is_trusted(&self, region: &Region, actor: ActorId, min_tier: TrustTier) -> bool {
        self.trust_level(region, actor)
            .is_some_and(|tier| tier >= min_tier)
    }

    /// Create a claim. Overlap with a sibling is an expected
    /// [`ClaimError::Conflict`] carrying the blocking region; it is not
    /// logged. Min-size and claim-budget policy is the caller's to enforce
    /// before calling.
    pub fn create_claim(
        &self,
        world: &WorldId,
        bounds: ClaimBox,
        cuboid: bool,
        owner: Option<ActorId>,
        kind: RegionKind,
        parent: Option<RegionId>,
    ) -> Result<Arc<Region>, ClaimError> {
        let id = RegionId::new(self.next_region_id.fetch_add(1, Ordering::Relaxed));
        let candidate = Region::new(id, world.clone(), kind, bounds, cuboid, owner, parent);

        let index = self.world_index(world);
        let created = index.write().try_create(candidate)?;

        tracing::info!(
            "Created {} claim {} in {}",
            created.kind.as_str(),
            created.id,
            world
        );
        self.notify(world, RegionChange::Created { region: created.id });
        Ok(created)
    }

    /// Atomically replace a claim's bounds after revalidation.
    pub fn resize_claim(
        &self,
        id: RegionId,
        new_bounds: ClaimBox,
    ) -> Result<Arc<Region>, ClaimError> {
        let (world, index) = self.locate(id)?;
        let (old_bounds, resized) = {
            let mut idx = index.write();
            let old_bounds = idx
                .region(id)
                .ok_or(ClaimError::UnknownRegion(id))?
                .bounds;
            let resized = idx.try_resize(id, new_bounds)?;
            (old_bounds, resized)
        };

        tracing::debug!("Resized claim {} in {}", id, world);
        self.notify(
            &world,
            RegionChange::Resized {
                region: id,
                old_bounds,
                new_bounds: resized.bounds,
            },
        );
        Ok(resized)
    }

    /// Delete a claim. A claim with live subdivisions is refused unless
    /// `cascade` is set.
    pub fn delete_claim(&self, id: RegionId, cascade: bool) -> Result<(), ClaimError> {
        let (world, index) = self.locate(id)?;
        let cascaded = index.write().delete(id, cascade)?;

        tracing::info!(
            "Deleted claim {} in {} ({} subdivisions cascaded)",
            id,
            world,
            cascaded.len()
        );
        self.notify(&world, RegionChange::Deleted { region: id, cascaded });
        Ok(())
    }

    /// Transfer ownership. The new owner is stripped from the trust lists —
    /// ownership is implicit Management, and a stale explicit grant would
    /// otherwise outlive a later transfer away.
    pub fn transfer_ownership(
        &self,
        id: RegionId,
        new_owner: Option<ActorId>,
    ) -> Result<Arc<Region>, ClaimError> {
        let (world, index) = self.locate(id)?;
        let updated = index.write().edit(id, |region| {
            region.owner = new_owner;
            if let Some(owner) = new_owner {
                region.trust.set(TrustSubject::Actor(owner), None);
            }
        })?;

        tracing::info!("Transferred claim {} in {} to {:?}", id, world, new_owner);
        self.notify(
            &world,
            RegionChange::OwnerChanged {
                region: id,
                owner: new_owner,
            },
        );
        Ok(updated)
    }

    /// Set or clear (`None`) an explicit flag override.
    pub fn set_flag(
        &self,
        id: RegionId,
        action: ActionKey,
        value: Option<FlagValue>,
    ) -> Result<Arc<Region>, ClaimError> {
        let (world, index) = self.locate(id)?;
        let updated = index.write().edit(id, |region| match value {
            Some(value) => {
                region.flags.insert(action, value);
            }
            None => {
                region.flags.remove(&action);
            }
        })?;

        tracing::debug!(
            "Flag {} on claim {} in {} set to {:?}",
            action.as_str(),
            id,
            world,
            value
        );
        self.notify(
            &world,
            RegionChange::FlagChanged {
                region: id,
                action,
                value,
            },
        );
        Ok(updated)
    }

    /// Grant a trust tier to an actor or group, or revoke it (`None`).
    pub fn set_trust(
        &self,
        id: RegionId,
        subject: TrustSubject,
        tier: Option<TrustTier>,
    ) -> Result<Arc<Region>, ClaimError> {
        let (world, index) = self.locate(id)?;
        let updated = index
            .write()
            .edit(id, |region| region.trust.set(subject.clone(), tier))?;

        tracing::debug!("Trust on claim {} in {} set: {:?} -> {:?}", id, world, subject, tier);
        self.notify(
            &world,
            RegionChange::TrustChanged {
                region: id,
                subject,
                tier,
            },
        );
        Ok(updated)
    }

    /// Refresh a claim's `last_active` timestamp (owner activity). Consumed
    /// by the external expiry collaborator; does not invalidate caches.
    pub fn note_activity(&self, id: RegionId) -> Result<(), ClaimError> {
        let (world, index) = self.locate(id)?;
        index.write().touch(id, Utc::now())?;
        self.notify(&world, RegionChange::ActivityNoted { region: id });
        Ok(())
    }

    /// All top-level claims near a point, for inspection tooling.
    pub fn regions_near(
        &self,
        world: &WorldId,
        center: BlockPos,
        radius: i32,
    ) -> Vec<Arc<Region>> {
        self.world_index(world).read().regions_near(center, radius)
    }

    /// Every top-level claim owned by `actor`, across all worlds.
    pub fn claims_of(&self, actor: ActorId) -> Vec<Arc<Region>> {
        let worlds: Vec<Arc<RwLock<WorldIndex>>> =
            self.worlds.read().values().cloned().collect();
        let mut out = Vec::new();
        for index in worlds {
            out.extend(index.read().claims_of(actor));
        }
        out.sort_by_key(|region| region.id);
        out
    }

    /// Replay persisted records into a world's index at load time.
    ///
    /// Records are replayed parents-first with their recorded ids; the id
    /// allocator is advanced past the maximum seen. No change events are
    /// delivered — the persistence collaborator already has these records.
    pub fn load_world(
        &self,
        world: &WorldId,
        mut records: Vec<RegionRecord>,
    ) -> Result<usize, ClaimError> {
        records.sort_by_key(|record| (record.parent.is_some(), record.id));
        let index = self.world_index(world);
        let mut idx = index.write();

        let mut loaded = 0usize;
        let mut max_id = 0u64;
        for record in &records {
            if record.world != *world {
                tracing::warn!(
                    "Record {} belongs to world {}, not {}; skipped",
                    record.id,
                    record.world,
                    world
                );
                continue;
            }
            idx.try_create(Region::from_record(record))?;
            max_id = max_id.max(record.id.as_u64());
            loaded += 1;
        }
        drop(idx);

        self.next_region_id.fetch_max(max_id + 1, Ordering::Relaxed);
        tracing::info!("Loaded {} claims into {}", loaded, world);
        Ok(loaded)
    }

    /// Portable records for every claim in `world`, for checkpointing.
    pub fn snapshot_world(&self, world: &WorldId) -> Result<Vec<RegionRecord>, ClaimError> {
        let worlds = self.worlds.read();
        let index = worlds
            .get(world)
            .ok_or_else(|| ClaimError::UnknownWorld(world.clone()))?;
        let snapshot = index.read().snapshot();
        Ok(snapshot)
    }

    /// Find the world index holding `id`. Servers run a handful of worlds,
    /// so a linear scan beats maintaining a reverse map under every lock.
    fn locate(&self, id: RegionId) -> Result<(WorldId, Arc<RwLock<WorldIndex>>), ClaimError> {
        let worlds = self.worlds.read();
        for (world, index) in worlds.iter() {
            if index.read().contains_region(id) {
                return Ok((world.clone(), index.clone()));
            }
        }
        Err(ClaimError::UnknownRegion(id))
    }

    fn notify(&self, world: &WorldId, change: RegionChange) {
        let observers: Vec<Arc<dyn RegionObserver>> = self.observers.read().clone();
        for observer in &observers {
            observer.region_changed(world, &change);
        }
    }
}
