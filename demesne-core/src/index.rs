//! Per-world claim index: chunk-bucketed spatial lookup plus the
//! create/resize/delete transactions that uphold the no-overlap invariant.
//!
//! The world is partitioned into fixed 16×16 horizontal buckets; every
//! top-level region is indexed under each bucket its bounds touch, and a
//! point query scans the candidate list of a single bucket. Claims are
//! sparse, so bucket occupancy stays low; an R-tree would be asymptotically
//! better but is not needed at these densities. Subdivisions are not
//! bucketed — they are found by descending from their parent.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use demesne_types::{ActorId, BlockPos, ChunkPos, ClaimBox, RegionId, RegionRecord, WorldId};

use crate::errors::ClaimError;
use crate::region::Region;

/// All claims of one world, plus the wilderness sentinel.
///
/// Mutations replace whole `Arc<Region>` records (copy-and-swap), so a
/// reader holding a shared lock never observes a half-updated region. The
/// generation counter increments on every mutation that can affect
/// resolution; session caches stamped with an older generation treat their
/// entries as misses.
#[derive(Debug)]
pub struct WorldIndex {
    world: WorldId,
    regions: HashMap<RegionId, Arc<Region>>,
    buckets: HashMap<ChunkPos, Vec<RegionId>>,
    wilderness: Arc<Region>,
    generation: u64,
    world_floor: i32,
    world_ceiling: i32,
}

impl WorldIndex {
    pub fn new(world: WorldId, world_floor: i32, world_ceiling: i32) -> Self {
        let wilderness = Arc::new(Region::wilderness(world.clone()));
        Self {
            world,
            regions: HashMap::new(),
            buckets: HashMap::new(),
            wilderness,
            generation: 0,
            world_floor,
            world_ceiling,
        }
    }

    pub fn world(&self) -> &WorldId {
        &self.world
    }

    /// Bumped on every resolution-affecting mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Force a generation bump without a structural change, e.g. after a
    /// policy swap that changes what cached verdicts would resolve to.
    pub(crate) fn bump_generation(&mut self) {
        self.generation += 1;
    }

    pub fn wilderness(&self) -> &Arc<Region> {
        &self.wilderness
    }

    pub fn region(&self, id: RegionId) -> Option<&Arc<Region>> {
        self.regions.get(&id)
    }

    pub fn contains_region(&self, id: RegionId) -> bool {
        self.regions.contains_key(&id)
    }

    pub fn claim_count(&self) -> usize {
        self.regions.len()
    }

    pub fn regions(&self) -> impl Iterator<Item = &Arc<Region>> {
        self.regions.values()
    }

    /// The most specific region containing `pos`: a subdivision beats its
    /// parent, and unclaimed space resolves to the wilderness sentinel —
    /// never "not found".
    pub fn region_at(&self, pos: BlockPos) -> Arc<Region> {
        let mut hit: Option<&Arc<Region>> = None;
        if let Some(ids) = self.buckets.get(&ChunkPos::of_block(pos)) {
            for id in ids {
                let region = &self.regions[id];
                if region.contains(pos) {
                    // Two top-level siblings containing one point means the
                    // create/resize validation was bypassed; fail loudly
                    // rather than silently pick one.
                    assert!(
                        hit.is_none(),
                        "overlapping top-level claims {} and {} in world {}",
                        hit.unwrap().id,
                        region.id,
                        self.world
                    );
                    hit = Some(region);
                }
            }
        }
        match hit {
            Some(top) => self.refine(top, pos),
            None => self.wilderness.clone(),
        }
    }

    /// Given a region already known to contain `pos`, return the most
    /// specific region at `pos`: the containing subdivision if one exists,
    /// otherwise the region itself. Used by the point query and by the
    /// session-hint fast path.
    pub fn refine(&self, region: &Arc<Region>, pos: BlockPos) -> Arc<Region> {
        let mut hit: Option<&Arc<Region>> = None;
        for child_id in &region.children {
            if let Some(child) = self.regions.get(child_id) {
                if child.contains(pos) {
                    assert!(
                        hit.is_none(),
                        "overlapping subdivisions {} and {} under claim {}",
                        hit.unwrap().id,
                        child.id,
                        region.id
                    );
                    hit = Some(child);
                }
            }
        }
        hit.cloned().unwrap_or_else(|| region.clone())
    }

    /// All top-level regions whose footprint lies within `radius` blocks of
    /// `center` horizontally (inclusive at the boundary), closest first.
    pub fn regions_near(&self, center: BlockPos, radius: i32) -> Vec<Arc<Region>> {
        let radius = radius.max(0);
        let min = ChunkPos::of_block(BlockPos::new(
            center.x.saturating_sub(radius),
            center.y,
            center.z.saturating_sub(radius),
        ));
        let max = ChunkPos::of_block(BlockPos::new(
            center.x.saturating_add(radius),
            center.y,
            center.z.saturating_add(radius),
        ));

        let mut seen = HashSet::new();
        let mut found: Vec<(f64, Arc<Region>)> = Vec::new();
        for cx in min.x..=max.x {
            for cz in min.z..=max.z {
                let Some(ids) = self.buckets.get(&ChunkPos::new(cx, cz)) else {
                    continue;
                };
                for id in ids {
                    if !seen.insert(*id) {
                        continue;
                    }
                    let region = &self.regions[id];
                    let distance = region.bounds.distance_column(center);
                    if distance <= f64::from(radius) {
                        found.push((distance, region.clone()));
                    }
                }
            }
        }
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found.into_iter().map(|(_, region)| region).collect()
    }

    /// Top-level claims owned by `owner`, in id order.
    pub fn claims_of(&self, owner: ActorId) -> Vec<Arc<Region>> {
        let mut out: Vec<Arc<Region>> = self
            .regions
            .values()
            .filter(|r| r.is_top_level() && r.owner == Some(owner))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.id);
        out
    }

    /// Validate and insert a candidate region.
    ///
    /// A `Conflict` result is an expected outcome, not an exceptional path:
    /// it carries the blocking sibling for caller-side reporting. Hard
    /// errors (`InvalidBounds`, `UnknownRegion`, `DepthExceeded`,
    /// `OutsideParent`) leave the index unchanged.
    pub fn try_create(&mut self, mut candidate: Region) -> Result<Arc<Region>, ClaimError> {
        debug_assert_eq!(candidate.world, self.world);
        debug_assert!(!candidate.is_wilderness(), "the wilderness sentinel is not created");
        assert!(
            candidate.id != RegionId::WILDERNESS && !self.regions.contains_key(&candidate.id),
            "region id {} already present in world {}",
            candidate.id,
            self.world
        );
        candidate.bounds = self.normalized(candidate.bounds, candidate.cuboid)?;
        candidate.children.clear();

        match candidate.parent {
            Some(parent_id) => {
                let parent = self
                    .regions
                    .get(&parent_id)
                    .cloned()
                    .ok_or(ClaimError::UnknownRegion(parent_id))?;
                if parent.is_subdivision() {
                    return Err(ClaimError::DepthExceeded { parent: parent_id });
                }
                if !encloses(&parent.bounds, parent.cuboid, &candidate.bounds, candidate.cuboid) {
                    return Err(ClaimError::OutsideParent { parent: parent_id });
                }
                if let Some(blocking) =
                    self.sibling_conflict(&parent, &candidate.bounds, candidate.cuboid, None)
                {
                    return Err(ClaimError::Conflict { blocking });
                }
                // Subdivisions inherit the parent's owner unless one was given
                if candidate.owner.is_none() {
                    candidate.owner = parent.owner;
                }

                let mut updated = (*parent).clone();
                updated.children.push(candidate.id);
                self.regions.insert(parent_id, Arc::new(updated));
            }
            None => {
                if let Some(blocking) = self.top_level_conflict(&candidate.bounds, None) {
                    return Err(ClaimError::Conflict { blocking });
                }
            }
        }

        let id = candidate.id;
        let region = Arc::new(candidate);
        if region.is_top_level() {
            for chunk in region.bounds.chunks() {
                self.buckets.entry(chunk).or_default().push(id);
            }
        }
        self.regions.insert(id, region.clone());
        self.generation += 1;
        Ok(region)
    }

    /// Validate new bounds for an existing region and atomically swap them
    /// in. A failed validation leaves the region and the buckets exactly as
    /// they were.
    pub fn try_resize(
        &mut self,
        id: RegionId,
        new_bounds: ClaimBox,
    ) -> Result<Arc<Region>, ClaimError> {
        let region = self
            .regions
            .get(&id)
            .cloned()
            .ok_or(ClaimError::UnknownRegion(id))?;
        let new_bounds = self.normalized(new_bounds, region.cuboid)?;

        match region.parent {
            Some(parent_id) => {
                let parent = self
                    .regions
                    .get(&parent_id)
                    .cloned()
                    .ok_or(ClaimError::UnknownRegion(parent_id))?;
                if !encloses(&parent.bounds, parent.cuboid, &new_bounds, region.cuboid) {
                    return Err(ClaimError::OutsideParent { parent: parent_id });
                }
                if let Some(blocking) =
                    self.sibling_conflict(&parent, &new_bounds, region.cuboid, Some(id))
                {
                    return Err(ClaimError::Conflict { blocking });
                }
            }
            None => {
                if let Some(blocking) = self.top_level_conflict(&new_bounds, Some(id)) {
                    return Err(ClaimError::Conflict { blocking });
                }
                // A shrink must keep every subdivision inside
                for child_id in &region.children {
                    if let Some(child) = self.regions.get(child_id) {
                        if !encloses(&new_bounds, region.cuboid, &child.bounds, child.cuboid) {
                            return Err(ClaimError::OutsideParent { parent: id });
                        }
                    }
                }
            }
        }

        if region.is_top_level() {
            self.unbucket(id, &region.bounds);
            for chunk in new_bounds.chunks() {
                self.buckets.entry(chunk).or_default().push(id);
            }
        }
        let mut updated = (*region).clone();
        updated.bounds = new_bounds;
        let updated = Arc::new(updated);
        self.regions.insert(id, updated.clone());
        self.generation += 1;
        Ok(updated)
    }

    /// Remove a region. A region with live subdivisions is refused unless
    /// `cascade` is set; cascaded child ids are returned for event delivery.
    pub fn delete(&mut self, id: RegionId, cascade: bool) -> Result<Vec<RegionId>, ClaimError> {
        let region = self
            .regions
            .get(&id)
            .cloned()
            .ok_or(ClaimError::UnknownRegion(id))?;
        if !region.children.is_empty() && !cascade {
            return Err(ClaimError::NonEmptyParent {
                region: id,
                children: region.children.len(),
            });
        }

        for child_id in &region.children {
            self.regions.remove(child_id);
        }
        if region.is_top_level() {
            self.unbucket(id, &region.bounds);
        } else if let Some(parent_id) = region.parent {
            if let Some(parent) = self.regions.get(&parent_id) {
                let mut updated = (**parent).clone();
                updated.children.retain(|c| *c != id);
                self.regions.insert(parent_id, Arc::new(updated));
            }
        }
        self.regions.remove(&id);
        self.generation += 1;
        Ok(region.children.clone())
    }

    /// Portable records for every claim, parents before children, replayable
    /// through `try_create` in order.
    pub fn snapshot(&self) -> Vec<RegionRecord> {
        let mut records: Vec<RegionRecord> =
            self.regions.values().map(|r| r.to_record()).collect();
        records.sort_by_key(|r| (r.parent.is_some(), r.id));
        records
    }

    /// Copy-and-swap edit of attributes that affect resolution (flags,
    /// trust, owner). Bumps the generation.
    pub(crate) fn edit<F>(&mut self, id: RegionId, f: F) -> Result<Arc<Region>, ClaimError>
    where
        F: FnOnce(&mut Region),
    {
        let region = self
            .regions
            .get(&id)
            .ok_or(ClaimError::UnknownRegion(id))?;
        let mut updated = (**region).clone();
        f(&mut updated);
        let updated = Arc::new(updated);
        self.regions.insert(id, updated.clone());
        self.generation += 1;
        Ok(updated)
    }

    /// Refresh `last_active`. Does not bump the generation: activity does
    /// not affect resolution, and routine movement must not invalidate
    /// every session cache in the world.
    pub(crate) fn touch(
        &mut self,
        id: RegionId,
        now: DateTime<Utc>,
    ) -> Result<Arc<Region>, ClaimError> {
        let region = self
            .regions
            .get(&id)
            .ok_or(ClaimError::UnknownRegion(id))?;
        let mut updated = (**region).clone();
        updated.last_active = now;
        let updated = Arc::new(updated);
        self.regions.insert(id, updated.clone());
        Ok(updated)
    }

    fn normalized(&self, bounds: ClaimBox, cuboid: bool) -> Result<ClaimBox, ClaimError> {
        if !bounds.is_normalized() {
            return Err(ClaimError::InvalidBounds {
                bounds,
                reason: "inverted corners",
            });
        }
        if cuboid {
            if bounds.min.y < self.world_floor || bounds.max.y > self.world_ceiling {
                return Err(ClaimError::InvalidBounds {
                    bounds,
                    reason: "outside world height limits",
                });
            }
            Ok(bounds)
        } else {
            // Column claims canonically span the world's full vertical range
            Ok(ClaimBox::new(
                BlockPos::new(bounds.min.x, self.world_floor, bounds.min.z),
                BlockPos::new(bounds.max.x, self.world_ceiling, bounds.max.z),
            ))
        }
    }

    /// First top-level region whose footprint intersects `bounds`, skipping
    /// `exclude`. Top-level overlap is horizontal: a claim owns its column.
    fn top_level_conflict(
        &self,
        bounds: &ClaimBox,
        exclude: Option<RegionId>,
    ) -> Option<Arc<Region>> {
        let mut seen = HashSet::new();
        for chunk in bounds.chunks() {
            let Some(ids) = self.buckets.get(&chunk) else {
                continue;
            };
            for id in ids {
                if Some(*id) == exclude || !seen.insert(*id) {
                    continue;
                }
                let other = &self.regions[id];
                if bounds.intersects_column(&other.bounds) {
                    return Some(other.clone());
                }
            }
        }
        None
    }

    /// First sibling subdivision under `parent` overlapping the candidate
    /// bounds. Two cuboid siblings may stack vertically; any other pairing
    /// is tested on the footprint alone.
    fn sibling_conflict(
        &self,
        parent: &Region,
        bounds: &ClaimBox,
        cuboid: bool,
        exclude: Option<RegionId>,
    ) -> Option<Arc<Region>> {
        for child_id in &parent.children {
            if Some(*child_id) == exclude {
                continue;
            }
            let Some(child) = self.regions.get(child_id) else {
                continue;
            };
            let overlapping = if cuboid && child.cuboid {
                bounds.intersects(&child.bounds)
            } else {
                bounds.intersects_column(&child.bounds)
            };
            if overlapping {
                return Some(child.clone());
            }
        }
        None
    }

    fn unbucket(&mut self, id: RegionId, bounds: &ClaimBox) {
        for chunk in bounds.chunks() {
            if let Some(ids) = self.buckets.get_mut(&chunk) {
                ids.retain(|r| *r != id);
                if ids.is_empty() {
                    self.buckets.remove(&chunk);
                }
            }
        }
    }
}

fn encloses(
    parent: &ClaimBox,
    parent_cuboid: bool,
    child: &ClaimBox,
    child_cuboid: bool,
) -> bool {
    if parent_cuboid {
        // A column child cannot fit inside a finite cuboid
        child_cuboid && parent.encloses(child)
    } else {
        parent.encloses_column(child)
    }
}
