//! The result assembler (§4.F): tile-stitching (merge strategies) and the concatenation
//! of per-tile results into one globally consistent labeling.

#[cfg(test)]
use crate::aabb::AxisAlignedBoundingBox2d;
use crate::config::MergeStrategy;
use crate::point::{LabeledPoint, ModedPoint, Point};
use crate::tiling::{Tile, TileId};
use crate::{new_map, MapType};

/// The outcome of processing a single tile (§4.D, §4.E): every retained point together
/// with a crown id that is only unique *within this tile* (`0` = noise). The assembler
/// is responsible for turning these into globally unique ids.
#[derive(Debug, Clone)]
pub struct TileResult {
    /// Spatial id of the tile that produced this result, used to order results
    /// deterministically before renumbering (§4.D, §4.F).
    pub tile_id: TileId,
    /// Retained points and their tile-local crown id.
    pub points: Vec<(ModedPoint, u64)>,
}

/// Decides, for every point processed by `tile`, whether it is retained by `tile`
/// according to `strategy` (§4.F, §9 open question on tile-stitching strategies).
///
/// `local_ids[i]` is the tile-local crown id of `modes[i]` (`0` = noise). `modes` and
/// `local_ids` must be the same length as `tile.points`.
pub fn retain_mask(
    tile: &Tile,
    modes: &[Point],
    local_ids: &[u64],
    core_width: f64,
    strategy: MergeStrategy,
) -> Vec<bool> {
    match strategy {
        MergeStrategy::ClusterCenter => retain_by_cluster_center(tile, modes, local_ids),
        MergeStrategy::RoundedMode => retain_by_rounded_mode(tile, modes, core_width),
    }
}

fn retain_by_cluster_center(tile: &Tile, modes: &[Point], local_ids: &[u64]) -> Vec<bool> {
    let mut sums: MapType<u64, (f64, f64, u32)> = new_map();
    for (&id, m) in local_ids.iter().zip(modes) {
        if id == 0 {
            continue;
        }
        let entry = sums.entry(id).or_insert((0.0, 0.0, 0));
        entry.0 += m.x;
        entry.1 += m.y;
        entry.2 += 1;
    }
    let centers: MapType<u64, (f64, f64)> = sums
        .into_iter()
        .map(|(id, (sx, sy, n))| (id, (sx / n as f64, sy / n as f64)))
        .collect();

    local_ids
        .iter()
        .zip(modes)
        .map(|(&id, m)| {
            let (cx, cy) = if id == 0 {
                (m.x, m.y)
            } else {
                centers[&id]
            };
            tile.core_bounds.contains_half_open(cx, cy)
        })
        .collect()
}

fn retain_by_rounded_mode(tile: &Tile, modes: &[Point], core_width: f64) -> Vec<bool> {
    // Recover the grid origin implied by this tile's own core bounds and id, so the
    // rounded cell can be compared against `tile.id` without threading the cloud-wide
    // origin through every call site.
    let (cx, cy) = tile.id;
    let origin_x = tile.core_bounds.min()[0] - cx as f64 * core_width;
    let origin_y = tile.core_bounds.min()[1] - cy as f64 * core_width;

    modes
        .iter()
        .map(|m| {
            let nx = ((m.x - origin_x) / core_width).round() as i64;
            let ny = ((m.y - origin_y) / core_width).round() as i64;
            (nx, ny) == tile.id
        })
        .collect()
}

/// Concatenates `tile_results` (sorted by tile id for determinism, §4.D) into a single
/// globally labeled cloud, rewriting each tile's local crown ids to be globally unique
/// while keeping id `0` reserved for noise everywhere (§4.F).
///
/// When `compact_ids` is set, a final pass renumbers the surviving non-zero ids to a
/// dense `1..=k` range in order of first appearance; id `0` is left untouched.
pub fn assemble(mut tile_results: Vec<TileResult>, compact_ids: bool) -> Vec<LabeledPoint> {
    tile_results.sort_by_key(|t| t.tile_id);

    let mut output = Vec::new();
    let mut noise = Vec::new();
    let mut offset: u64 = 0;

    for tile in tile_results {
        let mut max_local = 0u64;
        for (moded, local_id) in tile.points {
            if local_id == 0 {
                noise.push(LabeledPoint {
                    moded,
                    crown_id: 0,
                });
            } else {
                max_local = max_local.max(local_id);
                output.push(LabeledPoint {
                    moded,
                    crown_id: local_id + offset,
                });
            }
        }
        if max_local > 0 {
            offset = offset + max_local + 1;
        }
    }

    if compact_ids {
        compact_crown_ids(&mut output);
    }

    output.extend(noise);
    output
}

fn compact_crown_ids(points: &mut [LabeledPoint]) {
    let mut remap: MapType<u64, u64> = new_map();
    let mut next = 1u64;
    for p in points.iter_mut() {
        debug_assert_ne!(p.crown_id, 0, "noise points are appended separately");
        let id = *remap.entry(p.crown_id).or_insert_with(|| {
            let assigned = next;
            next += 1;
            assigned
        });
        p.crown_id = id;
    }
}
