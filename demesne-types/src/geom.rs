//! Block coordinates, chunk coordinates, and inclusive axis-aligned boxes.

use serde::{Deserialize, Serialize};

/// Horizontal edge length of one spatial bucket, matching the world's
/// natural chunking.
pub const CHUNK_SIZE: i32 = 16;

/// Integer block coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Horizontal chunk coordinate of one spatial bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Bucket containing the given block position.
    pub fn of_block(pos: BlockPos) -> Self {
        Self {
            x: pos.x.div_euclid(CHUNK_SIZE),
            z: pos.z.div_euclid(CHUNK_SIZE),
        }
    }
}

/// Axis-aligned box between two corner blocks, inclusive on every face.
///
/// `min` and `max` are normalized at construction; an inverted box cannot be
/// represented through [`ClaimBox::new`]. A one-block box (`min == max`) is
/// valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimBox {
    pub min: BlockPos,
    pub max: BlockPos,
}

impl ClaimBox {
    /// Build a box from two arbitrary corners, normalizing min/max per axis.
    pub fn new(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// True when the corners are ordered on every axis. Boxes built through
    /// [`ClaimBox::new`] always are; deserialized records may not be.
    pub fn is_normalized(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn width(&self) -> i64 {
        i64::from(self.max.x) - i64::from(self.min.x) + 1
    }

    pub fn length(&self) -> i64 {
        i64::from(self.max.z) - i64::from(self.min.z) + 1
    }

    pub fn height(&self) -> i64 {
        i64::from(self.max.y) - i64::from(self.min.y) + 1
    }

    /// Horizontal footprint in blocks.
    pub fn area(&self) -> i64 {
        self.width() * self.length()
    }

    /// True when `pos` lies inside the horizontal footprint, ignoring height.
    pub fn contains_column(&self, pos: BlockPos) -> bool {
        pos.x >= self.min.x && pos.x <= self.max.x && pos.z >= self.min.z && pos.z <= self.max.z
    }

    /// True when `pos` lies inside the box on all three axes.
    pub fn contains(&self, pos: BlockPos) -> bool {
        self.contains_column(pos) && pos.y >= self.min.y && pos.y <= self.max.y
    }

    /// True when the horizontal footprints of the two boxes share any block.
    pub fn intersects_column(&self, other: &ClaimBox) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }

    /// True when the two boxes share any block in all three dimensions.
    pub fn intersects(&self, other: &ClaimBox) -> bool {
        self.intersects_column(other) && self.min.y <= other.max.y && other.min.y <= self.max.y
    }

    /// True when `other` lies entirely inside this box horizontally.
    pub fn encloses_column(&self, other: &ClaimBox) -> bool {
        self.min.x <= other.min.x
            && self.max.x >= other.max.x
            && self.min.z <= other.min.z
            && self.max.z >= other.max.z
    }

    /// True when `other` lies entirely inside this box on all three axes.
    pub fn encloses(&self, other: &ClaimBox) -> bool {
        self.encloses_column(other) && self.min.y <= other.min.y && self.max.y >= other.max.y
    }

    /// Horizontal distance from `pos` to the nearest block of the footprint;
    /// zero when `pos` is inside it.
    pub fn distance_column(&self, pos: BlockPos) -> f64 {
        let dx = if pos.x < self.min.x {
            self.min.x - pos.x
        } else if pos.x > self.max.x {
            pos.x - self.max.x
        } else {
            0
        };
        let dz = if pos.z < self.min.z {
            self.min.z - pos.z
        } else if pos.z > self.max.z {
            pos.z - self.max.z
        } else {
            0
        };
        f64::from(dx).hypot(f64::from(dz))
    }

    /// All spatial buckets the horizontal footprint touches.
    pub fn chunks(&self) -> Vec<ChunkPos> {
        let min = ChunkPos::of_block(self.min);
        let max = ChunkPos::of_block(self.max);
        let span = (i64::from(max.x) - i64::from(min.x) + 1) * (i64::from(max.z) - i64::from(min.z) + 1);
        let mut out = Vec::with_capacity(span as usize);
        for cx in min.x..=max.x {
            for cz in min.z..=max.z {
                out.push(ChunkPos::new(cx, cz));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_normalization() {
        let b = ClaimBox::new(BlockPos::new(9, 64, -3), BlockPos::new(0, 0, 9));
        assert_eq!(b.min, BlockPos::new(0, 0, -3));
        assert_eq!(b.max, BlockPos::new(9, 64, 9));
        assert!(b.is_normalized());
    }

    #[test]
    fn test_inclusive_containment() {
        let b = ClaimBox::new(BlockPos::new(0, 0, 0), BlockPos::new(9, 9, 9));
        assert!(b.contains(BlockPos::new(0, 0, 0)));
        assert!(b.contains(BlockPos::new(9, 9, 9)));
        assert!(!b.contains(BlockPos::new(10, 5, 5)));
        assert!(!b.contains(BlockPos::new(5, 10, 5)));

        // Column containment ignores height entirely
        assert!(b.contains_column(BlockPos::new(5, 300, 5)));
        assert!(!b.contains_column(BlockPos::new(-1, 5, 5)));
    }

    #[test]
    fn test_intersection_is_inclusive_at_edges() {
        let a = ClaimBox::new(BlockPos::new(0, 0, 0), BlockPos::new(9, 9, 9));
        let touching = ClaimBox::new(BlockPos::new(9, 0, 9), BlockPos::new(15, 9, 15));
        let apart = ClaimBox::new(BlockPos::new(10, 0, 10), BlockPos::new(15, 9, 15));

        assert!(a.intersects_column(&touching));
        assert!(!a.intersects_column(&apart));

        // Vertically stacked boxes share a column but not a block
        let above = ClaimBox::new(BlockPos::new(0, 10, 0), BlockPos::new(9, 20, 9));
        assert!(a.intersects_column(&above));
        assert!(!a.intersects(&above));
    }

    #[test]
    fn test_chunk_span() {
        let b = ClaimBox::new(BlockPos::new(-1, 0, 0), BlockPos::new(16, 0, 15));
        let chunks = b.chunks();
        // x spans chunks -1..=1, z spans chunk 0
        assert_eq!(chunks.len(), 3);
        assert!(chunks.contains(&ChunkPos::new(-1, 0)));
        assert!(chunks.contains(&ChunkPos::new(0, 0)));
        assert!(chunks.contains(&ChunkPos::new(1, 0)));
    }

    #[test]
    fn test_distance_to_footprint() {
        let b = ClaimBox::new(BlockPos::new(0, 0, 0), BlockPos::new(9, 9, 9));
        assert_eq!(b.distance_column(BlockPos::new(5, 0, 5)), 0.0);
        assert_eq!(b.distance_column(BlockPos::new(12, 0, 5)), 3.0);
        assert_eq!(b.distance_column(BlockPos::new(12, 0, 13)), 5.0);
    }
}
