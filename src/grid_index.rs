//! Uniform-grid spatial index used to accelerate the mean-shift engine's inner
//! neighbor scan (§4.B) and, sharing the same structure, the mode labeler's
//! ε-neighborhood queries (§4.E, §9).
//!
//! Points are bucketed into square cells in the XY plane sized to the largest radius the
//! caller will ever query with (the mean-shift engine's `r_max`, or the labeler's
//! `eps`). A query for all points that could lie within some radius `r` not exceeding
//! that cell size only has to visit the ring of cells covering that radius, rather than
//! every point in the tile; callers still apply their own exact test to every candidate
//! (the cylinder test in [`crate::kernel`], or a 3D Euclidean distance check), so results
//! are numerically identical to a naive full scan.

use crate::{new_map, MapType};
use itertools::iproduct;
use smallvec::SmallVec;

type CellId = (i64, i64);

/// A uniform grid over the XY plane, bucketing point indices by cell.
pub struct UniformGridIndex {
    cell_size: f64,
    buckets: MapType<CellId, SmallVec<[u32; 8]>>,
}

impl UniformGridIndex {
    /// Builds an index over `positions` (interpreted as `(x, y)` pairs), using
    /// `cell_size = r_max` as required by §4.B. `cell_size` must be strictly positive;
    /// callers are expected to have validated `r_max > 0` upstream (it derives from
    /// `crown_diameter_to_height * z_max * 0.5`, which the configuration and cull-step
    /// invariants keep positive for any non-empty, above-ground cloud).
    pub fn build(positions: impl Iterator<Item = (f64, f64)>, cell_size: f64) -> Self {
        debug_assert!(cell_size > 0.0);
        let mut buckets: MapType<CellId, SmallVec<[u32; 8]>> = new_map();
        for (i, (x, y)) in positions.enumerate() {
            let cell = Self::cell_of(x, y, cell_size);
            buckets.entry(cell).or_default().push(i as u32);
        }
        Self { cell_size, buckets }
    }

    fn cell_of(x: f64, y: f64, cell_size: f64) -> CellId {
        ((x / cell_size).floor() as i64, (y / cell_size).floor() as i64)
    }

    /// Visits every candidate point index whose cell could contain a point within
    /// `radius` of `(cx, cy)`. `radius` must be `<= cell_size` (the index's `r_max`);
    /// the caller still has to apply the exact geometric test, since this only narrows
    /// down cells, not distances.
    pub fn for_each_candidate(&self, cx: f64, cy: f64, radius: f64, mut visit: impl FnMut(u32)) {
        let (cell_x, cell_y) = Self::cell_of(cx, cy, self.cell_size);
        let ring = (radius / self.cell_size).ceil() as i64 + 1;
        for (dx, dy) in iproduct!(-ring..=ring, -ring..=ring) {
            if let Some(bucket) = self.buckets.get(&(cell_x + dx, cell_y + dy)) {
                for &idx in bucket {
                    visit(idx);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_points_within_radius() {
        let positions = vec![(0.0, 0.0), (1.0, 1.0), (50.0, 50.0)];
        let index = UniformGridIndex::build(positions.into_iter(), 5.0);

        let mut found = Vec::new();
        index.for_each_candidate(0.0, 0.0, 2.0, |i| found.push(i));
        found.sort();
        assert!(found.contains(&0));
        assert!(found.contains(&1));
        assert!(!found.contains(&2));
    }

    #[test]
    fn empty_index_yields_no_candidates() {
        let index = UniformGridIndex::build(std::iter::empty(), 1.0);
        let mut count = 0;
        index.for_each_candidate(0.0, 0.0, 1.0, |_| count += 1);
        assert_eq!(count, 0);
    }
}
