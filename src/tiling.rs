//! The tile splitter (§4.C): partitions a cloud's XY extent into disjoint core tiles
//! with overlapping buffer halos.

use itertools::iproduct;

use crate::aabb::AxisAlignedBoundingBox2d;
use crate::point::Point;
use crate::{new_map, MapType};

/// Spatial id of a tile: `(floor((x - x0) / core_width), floor((y - y0) / core_width))`.
pub type TileId = (i64, i64);

/// A rectangular core region with an overlapping buffer halo, and the points that fall
/// within its buffered extent (§3).
#[derive(Debug, Clone)]
pub struct Tile {
    /// This tile's spatial id, used to order tiles deterministically during assembly
    /// (§4.D, §4.F).
    pub id: TileId,
    /// The tile's disjoint core region.
    pub core_bounds: AxisAlignedBoundingBox2d,
    /// Every input point whose `(x, y)` lies in the buffered region, core points first.
    pub points: Vec<Point>,
    /// Original index (into the input slice passed to [`split_cloud_buffered`]) of each
    /// entry in [`Tile::points`], in the same order.
    pub source_indices: Vec<u32>,
    /// `in_buffer[i]` is `true` iff `points[i]` lies outside this tile's core region.
    pub in_buffer: Vec<bool>,
}

impl Tile {
    /// Number of points carried by this tile (core + buffer).
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// `true` if this tile carries no points at all (neither core nor buffer).
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Splits `points` into tiles per §4.C: core regions tile the cloud's XY bounding box
/// on a grid aligned to `(floor(x_min / core_width) * core_width, floor(y_min /
/// core_width) * core_width)`, and each tile additionally carries points from
/// neighboring core cells that fall within `buffer_width` of its core boundary.
///
/// Only cells that contain at least one core point become tiles: the union of all
/// tiles' core regions is exactly the set of input points (§4.C invariant). Empty
/// input yields no tiles.
pub fn split_cloud_buffered(points: &[Point], core_width: f64, buffer_width: f64) -> Vec<Tile> {
    if points.is_empty() {
        return Vec::new();
    }

    let (x_min, y_min) = points.iter().fold(
        (f64::INFINITY, f64::INFINITY),
        |(mx, my), p| (mx.min(p.x), my.min(p.y)),
    );
    let x0 = (x_min / core_width).floor() * core_width;
    let y0 = (y_min / core_width).floor() * core_width;

    let core_id_of = |p: &Point| -> TileId {
        (
            ((p.x - x0) / core_width).floor() as i64,
            ((p.y - y0) / core_width).floor() as i64,
        )
    };

    let mut by_core_cell: MapType<TileId, Vec<u32>> = new_map();
    for (i, p) in points.iter().enumerate() {
        by_core_cell.entry(core_id_of(p)).or_default().push(i as u32);
    }

    let ring = if buffer_width > 0.0 {
        (buffer_width / core_width).ceil() as i64
    } else {
        0
    };

    let mut tile_ids: Vec<TileId> = by_core_cell.keys().copied().collect();
    tile_ids.sort_unstable();

    tile_ids
        .into_iter()
        .map(|(cx, cy)| {
            let core_bounds = AxisAlignedBoundingBox2d::new(
                [x0 + cx as f64 * core_width, y0 + cy as f64 * core_width],
                [
                    x0 + (cx + 1) as f64 * core_width,
                    y0 + (cy + 1) as f64 * core_width,
                ],
            );
            let buffered_bounds = core_bounds.grown(buffer_width);

            let mut tile_points = Vec::new();
            let mut source_indices = Vec::new();
            let mut in_buffer = Vec::new();

            for (dx, dy) in iproduct!(-ring..=ring, -ring..=ring) {
                let Some(indices) = by_core_cell.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &idx in indices {
                    let p = points[idx as usize];
                    if !buffered_bounds.contains_half_open(p.x, p.y) {
                        continue;
                    }
                    let is_core = core_bounds.contains_half_open(p.x, p.y);
                    tile_points.push(p);
                    source_indices.push(idx);
                    in_buffer.push(!is_core);
                }
            }

            Tile {
                id: (cx, cy),
                core_bounds,
                points: tile_points,
                source_indices,
                in_buffer,
            }
        })
        .collect()
}
