//! The parallel driver (§4.D, §5): dispatches per-tile mean-shift + labeling work to a
//! `rayon` worker pool and hands the collected per-tile results to the assembler.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::assemble::{assemble, retain_mask, TileResult};
use crate::cluster::label_modes;
use crate::config::Configuration;
use crate::error::SegmentationError;
use crate::mean_shift::mean_shift_cancellable;
use crate::point::{LabeledPoint, ModedPoint, Point};
use crate::progress::{ProgressSink, SharedProgress};
use crate::tiling::{split_cloud_buffered, Tile};
use crate::workspace::SegmentationWorkspace;

/// Runs AMS3D tree crown segmentation over `points` and returns a freshly allocated
/// labeled cloud (§6). Validates `cfg` eagerly; no tile is dispatched if validation
/// fails.
pub fn segment_tree_crowns(
    points: &[Point],
    cfg: &Configuration,
) -> Result<Vec<LabeledPoint>, SegmentationError> {
    let mut workspace = SegmentationWorkspace::default();
    segment_tree_crowns_inplace(points, cfg, &mut workspace, None)?;
    Ok(std::mem::take(workspace.output_mut()))
}

/// Same as [`segment_tree_crowns`], additionally reporting progress through `progress`
/// as tiles complete (§4.D, §6).
pub fn segment_tree_crowns_with_progress(
    points: &[Point],
    cfg: &Configuration,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<LabeledPoint>, SegmentationError> {
    let mut workspace = SegmentationWorkspace::default();
    segment_tree_crowns_inplace(points, cfg, &mut workspace, Some(progress))?;
    Ok(std::mem::take(workspace.output_mut()))
}

/// In-place variant of [`segment_tree_crowns`] (§6): writes into `workspace`'s reusable
/// output buffer instead of allocating a fresh one, so repeated calls (e.g. processing
/// many flight strips back to back) reuse scratch memory.
pub fn segment_tree_crowns_inplace(
    points: &[Point],
    cfg: &Configuration,
    workspace: &mut SegmentationWorkspace,
    progress: Option<&mut dyn ProgressSink>,
) -> Result<(), SegmentationError> {
    segment_tree_crowns_cancellable(points, cfg, workspace, progress, None)
}

/// Full-generality entry point: accepts an optional externally-owned cancellation flag
/// (§5, §7) in addition to everything [`segment_tree_crowns_inplace`] accepts.
///
/// If `cancel` is observed set (by the caller, from another thread) before every tile
/// has completed, in-flight tiles are allowed to finish but no new tile starts, and
/// [`SegmentationError::Cancelled`] is returned.
pub fn segment_tree_crowns_cancellable(
    points: &[Point],
    cfg: &Configuration,
    workspace: &mut SegmentationWorkspace,
    progress: Option<&mut dyn ProgressSink>,
    cancel: Option<&AtomicBool>,
) -> Result<(), SegmentationError> {
    cfg.validate()?;
    workspace.output_mut().clear();

    log::info!("segment_tree_crowns: starting on {} point(s)", points.len());

    if points.is_empty() {
        log::info!("segment_tree_crowns: empty input, nothing to do");
        return Ok(());
    }

    let tiles = split_cloud_buffered(points, cfg.core_width, cfg.buffer_width);
    let total = tiles.len();
    log::debug!("segment_tree_crowns: split into {} tile(s)", total);

    let num_threads = ((cfg.worker_fraction * available_parallelism() as f64).floor() as usize).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| SegmentationError::Unknown(anyhow::Error::new(e)))?;

    // `dispatch_stop` only gates whether a *new* tile starts; it is set when a sibling
    // tile panics (§4.D: "in-flight tasks are allowed to finish but no new tasks
    // start"). The cooperative abort of a tile's *already running* mean-shift loop is
    // driven exclusively by the caller-supplied `cancel` flag below, kept distinct so a
    // sibling panic never truncates a tile that is mid-computation.
    let dispatch_stop = AtomicBool::new(false);
    let no_cancel_requested = AtomicBool::new(false);
    let in_flight_cancel: &AtomicBool = cancel.unwrap_or(&no_cancel_requested);
    let progress_shared = SharedProgress::new(progress, total);
    let first_error: Mutex<Option<SegmentationError>> = Mutex::new(None);
    let workspace_ref: &SegmentationWorkspace = workspace;

    let outcomes: Vec<Option<TileResult>> = pool.install(|| {
        tiles
            .par_iter()
            .map(|tile| {
                if dispatch_stop.load(Ordering::Relaxed)
                    || cancel.map_or(false, |c| c.load(Ordering::Relaxed))
                {
                    dispatch_stop.store(true, Ordering::Relaxed);
                    return None;
                }

                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    process_tile(tile, cfg, in_flight_cancel, workspace_ref)
                }));

                let result = match outcome {
                    Ok(result) => result,
                    Err(payload) => {
                        dispatch_stop.store(true, Ordering::Relaxed);
                        let mut guard = first_error.lock();
                        if guard.is_none() {
                            *guard = Some(SegmentationError::WorkerPanic {
                                tile_id: tile.id,
                                message: panic_message(&payload),
                            });
                        }
                        return None;
                    }
                };

                progress_shared.tile_done();
                Some(result)
            })
            .collect()
    });

    if let Some(err) = first_error.into_inner() {
        return Err(err);
    }

    let results: Vec<TileResult> = match outcomes.into_iter().collect() {
        Some(results) => results,
        None => return Err(SegmentationError::Cancelled),
    };

    let labeled = assemble(results, cfg.compact_ids);
    log::info!(
        "segment_tree_crowns: finished, {} point(s) labeled",
        labeled.len()
    );
    *workspace.output_mut() = labeled;
    Ok(())
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Per-tile pipeline (§4.D): height cull, numerical re-centering, mean-shift, mode
/// labeling, un-shift, and merge-strategy filtering against the tile's core.
fn process_tile(
    tile: &Tile,
    cfg: &Configuration,
    cancel: &AtomicBool,
    workspace: &SegmentationWorkspace,
) -> TileResult {
    let filtered: Vec<Point> = tile
        .points
        .iter()
        .copied()
        .filter(|p| p.z >= cfg.min_height)
        .collect();

    if filtered.is_empty() {
        log::warn!(
            "tile {:?}: degenerate, no points remain after the min_height cull",
            tile.id
        );
        return TileResult {
            tile_id: tile.id,
            points: Vec::new(),
        };
    }

    // Shift XY so the tile's min corner sits at (0, 0) for numerical stability, then
    // un-shift once mean-shift and labeling are done (§4.D, steps 2 and 5).
    let origin = tile.core_bounds.min();
    let (shift_x, shift_y) = (origin[0], origin[1]);
    let shifted: Vec<Point> = filtered
        .iter()
        .map(|p| Point::new(p.x - shift_x, p.y - shift_y, p.z))
        .collect();

    let moded_shifted = match mean_shift_cancellable(&shifted, cfg, cancel) {
        Some(moded) => moded,
        None => {
            // Cooperative cancellation fired mid-tile; the caller discards partial
            // per-tile work, so an empty result is sufficient here.
            return TileResult {
                tile_id: tile.id,
                points: Vec::new(),
            };
        }
    };

    let local_cell = workspace.get_local();
    let mut local = local_cell.borrow_mut();
    local.clear();

    local.modes.extend(moded_shifted.iter().map(|m| m.mode));
    local.local_crown_ids = label_modes(&local.modes, cfg.cluster_eps, cfg.cluster_min_pts);

    let unshifted: Vec<ModedPoint> = moded_shifted
        .iter()
        .map(|m| {
            ModedPoint::new(
                Point::new(m.point.x + shift_x, m.point.y + shift_y, m.point.z),
                Point::new(m.mode.x + shift_x, m.mode.y + shift_y, m.mode.z),
            )
        })
        .collect();
    let unshifted_modes: Vec<Point> = unshifted.iter().map(|m| m.mode).collect();

    local.retain_mask = retain_mask(
        tile,
        &unshifted_modes,
        &local.local_crown_ids,
        cfg.core_width,
        cfg.merge_strategy,
    );

    let points: Vec<(ModedPoint, u64)> = unshifted
        .into_iter()
        .zip(local.local_crown_ids.iter().copied())
        .zip(local.retain_mask.iter().copied())
        .filter_map(|((moded, id), keep)| keep.then_some((moded, id)))
        .collect();

    drop(local);

    log::debug!(
        "tile {:?}: {} input, {} after height cull, {} retained",
        tile.id,
        tile.points.len(),
        filtered.len(),
        points.len()
    );

    TileResult {
        tile_id: tile.id,
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, KernelVariant, MergeStrategy};

    fn small_cfg() -> Configuration {
        let mut cfg = Configuration::classic_defaults(0.5, 1.0);
        cfg.min_height = 0.0;
        cfg.cluster_eps = 1.0;
        cfg.cluster_min_pts = 1;
        cfg.core_width = 1000.0;
        cfg.buffer_width = 10.0;
        cfg
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let labeled = segment_tree_crowns(&[], &small_cfg()).unwrap();
        assert!(labeled.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_before_any_work() {
        let mut cfg = small_cfg();
        cfg.core_width = -1.0;
        let err = segment_tree_crowns(&[Point::new(0.0, 0.0, 5.0)], &cfg).unwrap_err();
        assert!(matches!(err, SegmentationError::InvalidConfig(_)));
    }

    #[test]
    fn single_tower_yields_one_nonzero_crown() {
        let points = vec![
            Point::new(0.0, 0.0, 10.0),
            Point::new(0.0, 0.0, 11.0),
            Point::new(0.0, 0.0, 12.0),
        ];
        let labeled = segment_tree_crowns(&points, &small_cfg()).unwrap();
        assert_eq!(labeled.len(), 3);
        let first_id = labeled[0].crown_id;
        assert_ne!(first_id, 0);
        assert!(labeled.iter().all(|p| p.crown_id == first_id));
    }

    #[test]
    fn two_separated_towers_yield_two_crowns() {
        let points = vec![Point::new(0.0, 0.0, 10.0), Point::new(100.0, 0.0, 10.0)];
        let labeled = segment_tree_crowns(&points, &small_cfg()).unwrap();
        let ids: std::collections::HashSet<u64> = labeled.iter().map(|p| p.crown_id).collect();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&0));
    }

    #[test]
    fn noise_point_gets_zero_id() {
        let points = vec![
            Point::new(0.0, 0.0, 10.0),
            Point::new(0.0, 0.0, 11.0),
            Point::new(500.0, 500.0, 10.0),
        ];
        let labeled = segment_tree_crowns(&points, &small_cfg()).unwrap();
        let noise: Vec<_> = labeled
            .iter()
            .filter(|p| p.moded.point.x > 400.0)
            .collect();
        assert_eq!(noise.len(), 1);
        assert_eq!(noise[0].crown_id, 0);
    }

    #[test]
    fn below_height_points_are_dropped_not_clamped() {
        let points = vec![Point::new(0.0, 0.0, 0.5), Point::new(0.0, 0.0, 10.0)];
        let mut cfg = small_cfg();
        cfg.min_height = 2.0;
        let labeled = segment_tree_crowns(&points, &cfg).unwrap();
        assert_eq!(labeled.len(), 1);
        assert_eq!(labeled[0].moded.point.z, 10.0);
    }

    #[test]
    fn mass_conservation_across_tile_boundaries() {
        // Three colinear trees spanning three core tiles (§8, scenario E).
        let mut points = Vec::new();
        for &x in &[5.0, 20.0, 35.0] {
            for dz in 0..3 {
                points.push(Point::new(x, 0.0, 8.0 + dz as f64));
            }
        }
        let mut cfg = small_cfg();
        cfg.core_width = 15.0;
        cfg.buffer_width = 10.0;
        cfg.crown_diameter_to_height = 0.3;
        let labeled = segment_tree_crowns(&points, &cfg).unwrap();
        assert_eq!(labeled.len(), points.len());
        let ids: std::collections::HashSet<u64> = labeled.iter().map(|p| p.crown_id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn idempotence_under_tiling() {
        let points = vec![
            Point::new(0.0, 0.0, 10.0),
            Point::new(1.0, 0.0, 10.0),
            Point::new(50.0, 50.0, 10.0),
        ];
        // A huge core tile means everything is processed in a single tile.
        let mut single_tile_cfg = small_cfg();
        single_tile_cfg.core_width = 10_000.0;
        let tiled = segment_tree_crowns(&points, &single_tile_cfg).unwrap();

        let moded = crate::mean_shift::mean_shift(&points, &single_tile_cfg);
        let modes: Vec<Point> = moded.iter().map(|m| m.mode).collect();
        let direct_ids =
            label_modes(&modes, single_tile_cfg.cluster_eps, single_tile_cfg.cluster_min_pts);

        // Same partition, modulo renumbering: two points that share an id in one must
        // share an id in the other, and vice versa.
        for i in 0..points.len() {
            for j in 0..points.len() {
                let tiled_same = tiled[i].crown_id == tiled[j].crown_id;
                let direct_same = direct_ids[i] == direct_ids[j];
                assert_eq!(tiled_same, direct_same);
            }
        }
    }

    #[test]
    fn max_iterations_cap_does_not_error() {
        let points = vec![Point::new(0.0, 0.0, 1000.0)];
        let mut cfg = small_cfg();
        cfg.max_iterations = 1;
        let labeled = segment_tree_crowns(&points, &cfg).unwrap();
        assert_eq!(labeled.len(), 1);
    }

    #[test]
    fn rounded_mode_merge_strategy_also_conserves_mass() {
        let points = vec![
            Point::new(5.0, 5.0, 10.0),
            Point::new(25.0, 5.0, 10.0),
            Point::new(45.0, 5.0, 10.0),
        ];
        let mut cfg = small_cfg();
        cfg.core_width = 20.0;
        cfg.buffer_width = 5.0;
        cfg.merge_strategy = MergeStrategy::RoundedMode;
        let labeled = segment_tree_crowns(&points, &cfg).unwrap();
        assert_eq!(labeled.len(), points.len());
    }

    #[test]
    fn kernel_variant_is_configurable() {
        let points = vec![Point::new(0.0, 0.0, 10.0), Point::new(0.2, 0.0, 10.0)];
        let mut cfg = small_cfg();
        cfg.kernel_variant = KernelVariant::Improved;
        let labeled = segment_tree_crowns(&points, &cfg).unwrap();
        assert_eq!(labeled.len(), 2);
    }
}
