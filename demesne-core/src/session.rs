//! Per-actor transient state: the last resolved region and a small cache of
//! resolved verdicts.
//!
//! Both caches are stamped with the owning world's generation counter; any
//! structural mutation in that world bumps the counter and turns stale
//! entries into misses. Entries are never invalidated eagerly — staleness is
//! detected at lookup time, which keeps mutations cheap.

use std::num::NonZeroUsize;
use std::sync::Arc;

use demesne_types::{ActionKey, ActorId, BlockPos, RegionId, Verdict, WorldId};
use lru::LruCache;

use crate::region::Region;

const VERDICT_CACHE_SIZE: usize = 128;

#[derive(Debug, Clone)]
struct RegionHint {
    world: WorldId,
    region: Arc<Region>,
    generation: u64,
}

/// Transient session state for one actor.
///
/// Owned exclusively by the actor's session in the embedding server; no
/// locking here beyond what the surrounding session framework provides.
pub struct ActorSession {
    actor: ActorId,
    hint: Option<RegionHint>,
    verdicts: LruCache<(RegionId, ActionKey), (u64, Verdict)>,
    /// First corner of an in-progress claim selection, if any. Parked here
    /// between the caller's two selection events; the core never reads it.
    pub pending_corner: Option<BlockPos>,
}

impl ActorSession {
    pub fn new(actor: ActorId) -> Self {
        Self {
            actor,
            hint: None,
            verdicts: LruCache::new(NonZeroUsize::new(VERDICT_CACHE_SIZE).unwrap()),
            pending_corner: None,
        }
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// The last resolved region for `world`, with its generation stamp.
    /// Callers must treat a stamp older than the world's current generation
    /// as a miss.
    pub fn hint(&self, world: &WorldId) -> Option<(&Arc<Region>, u64)> {
        self.hint
            .as_ref()
            .filter(|h| h.world == *world)
            .map(|h| (&h.region, h.generation))
    }

    pub fn remember_region(&mut self, world: WorldId, region: Arc<Region>, generation: u64) {
        self.hint = Some(RegionHint {
            world,
            region,
            generation,
        });
    }

    /// Cached verdict for `(region, action)`, provided the stamp is current.
    /// A stale entry is dropped on the spot.
    pub fn cached_verdict(
        &mut self,
        region: RegionId,
        generation: u64,
        action: ActionKey,
    ) -> Option<Verdict> {
        match self.verdicts.get(&(region, action)).copied() {
            Some((stamp, verdict)) if stamp == generation => Some(verdict),
            Some(_) => {
                self.verdicts.pop(&(region, action));
                None
            }
            None => None,
        }
    }

    pub fn remember_verdict(
        &mut self,
        region: RegionId,
        generation: u64,
        action: ActionKey,
        verdict: Verdict,
    ) {
        self.verdicts.put((region, action), (generation, verdict));
    }

    /// Drop all cached state (e.g. on teleport or world change).
    pub fn clear(&mut self) {
        self.hint = None;
        self.verdicts.clear();
        self.pending_corner = None;
    }
}

impl std::fmt::Debug for ActorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorSession")
            .field("actor", &self.actor)
            .field("hint", &self.hint.as_ref().map(|h| h.region.id))
            .field("pending_corner", &self.pending_corner)
            .finish()
    }
}
