//! The adaptive mean-shift iterator (§4.B): moves each point's kernel centroid to a
//! local density mode.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::config::Configuration;
use crate::grid_index::UniformGridIndex;
use crate::kernel::CylinderKernel;
use crate::point::{ModedPoint, Point};

/// Runs the mean-shift engine over `points`, returning the converged mode for each
/// input point in the same order.
///
/// This is the non-cancellable convenience wrapper around
/// [`mean_shift_cancellable`] for callers that never cancel.
pub fn mean_shift(points: &[Point], cfg: &Configuration) -> Vec<ModedPoint> {
    mean_shift_cancellable(points, cfg, &AtomicBool::new(false))
        .expect("mean_shift: cancellation flag was never set")
}

/// Runs the mean-shift engine over `points`, checking `cancel` cooperatively between
/// points (§4.B, §5). Returns `None` if `cancel` was observed set before every point had
/// converged; the caller is expected to discard the partial work in that case (§7,
/// `SegmentationError::Cancelled`).
pub fn mean_shift_cancellable(
    points: &[Point],
    cfg: &Configuration,
    cancel: &AtomicBool,
) -> Option<Vec<ModedPoint>> {
    if points.is_empty() {
        return Some(Vec::new());
    }

    let z_max = points
        .iter()
        .map(|p| p.z)
        .fold(f64::NEG_INFINITY, f64::max);
    // r_max from §4.B: the largest possible cylinder radius over the whole tile, used
    // to size the acceleration grid's cells.
    let r_max = (cfg.crown_diameter_to_height * z_max.max(0.0) * 0.5).max(1e-9);
    let grid = UniformGridIndex::build(points.iter().map(|p| (p.x, p.y)), r_max);

    let results: Vec<Option<ModedPoint>> = points
        .par_iter()
        .map(|&p| {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            Some(converge_point(p, points, &grid, cfg))
        })
        .collect();

    results.into_iter().collect()
}

/// Iterates a single point's kernel to convergence (§4.B, steps 1-4).
fn converge_point(
    start: Point,
    points: &[Point],
    grid: &UniformGridIndex,
    cfg: &Configuration,
) -> ModedPoint {
    let mut centroid = start;
    let mut iterations_used = 0u32;
    let mut converged = false;

    for _ in 0..cfg.max_iterations {
        iterations_used += 1;
        let old = centroid;

        let kernel = CylinderKernel::for_centroid_height(
            centroid.z,
            cfg.crown_diameter_to_height,
            cfg.crown_height_to_height,
            cfg.kernel_variant,
        );

        let (mut sx, mut sy, mut sz, mut sw) = (0.0, 0.0, 0.0, 0.0);
        grid.for_each_candidate(centroid.x, centroid.y, kernel.radius, |j| {
            let q = points[j as usize];
            if kernel.contains(centroid.x, centroid.y, q.x, q.y, q.z) {
                let w = kernel.weight(centroid.x, centroid.y, centroid.z, q.x, q.y, q.z);
                sx += w * q.x;
                sy += w * q.y;
                sz += w * q.z;
                sw += w;
            }
        });

        if sw == 0.0 {
            // No neighbor found: halt immediately, keeping the previous centroid.
            centroid = old;
            converged = true;
            break;
        }

        centroid = Point::new(sx / sw, sy / sw, sz / sw);

        let step = (centroid - old).norm();
        if step <= cfg.convergence_epsilon {
            converged = true;
            break;
        }
    }

    log::trace!(
        "point ({:.3},{:.3},{:.3}) converged to mode ({:.3},{:.3},{:.3}) in {} iteration(s), \
         halted by {}",
        start.x,
        start.y,
        start.z,
        centroid.x,
        centroid.y,
        centroid.z,
        iterations_used,
        if converged { "convergence" } else { "iteration cap" }
    );

    ModedPoint::new(start, centroid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, KernelVariant};

    fn cfg(variant: KernelVariant) -> Configuration {
        let mut cfg = Configuration::classic_defaults(0.5, 1.0);
        cfg.kernel_variant = variant;
        cfg.cluster_eps = 1.0;
        cfg.cluster_min_pts = 1;
        cfg.min_height = 0.0;
        cfg
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let cfg = cfg(KernelVariant::Classic);
        assert!(mean_shift(&[], &cfg).is_empty());
    }

    #[test]
    fn single_tower_converges_to_one_neighborhood() {
        let points = vec![
            Point::new(0.0, 0.0, 10.0),
            Point::new(0.0, 0.0, 11.0),
            Point::new(0.0, 0.0, 12.0),
        ];
        let cfg = cfg(KernelVariant::Classic);
        let moded = mean_shift(&points, &cfg);
        assert_eq!(moded.len(), 3);
        let first = moded[0].mode;
        for m in &moded[1..] {
            assert!((m.mode - first).norm() < 0.2);
        }
    }

    #[test]
    fn two_separated_towers_converge_apart() {
        let points = vec![Point::new(0.0, 0.0, 10.0), Point::new(100.0, 0.0, 10.0)];
        let cfg = cfg(KernelVariant::Classic);
        let moded = mean_shift(&points, &cfg);
        assert!((moded[0].mode - moded[1].mode).norm() > 50.0);
    }

    #[test]
    fn max_iterations_of_one_performs_a_single_step() {
        let points = vec![Point::new(0.0, 0.0, 1000.0)];
        let mut cfg = cfg(KernelVariant::Classic);
        cfg.max_iterations = 1;
        let moded = mean_shift(&points, &cfg);
        // A single point alone always shifts to itself (it is its own only neighbor),
        // so the mode must equal the start exactly after one iteration.
        assert_eq!(moded[0].mode, points[0]);
    }

    #[test]
    fn isolated_point_converges_to_itself() {
        // A point with no other points nearby is still its own sole neighbor, so the
        // weighted average is itself and the mode equals the start exactly.
        let points = vec![Point::new(0.0, 0.0, 10.0)];
        let cfg = cfg(KernelVariant::Classic);
        let moded = mean_shift(&points, &cfg);
        assert_eq!(moded[0].mode, points[0]);
    }

    #[test]
    fn cancellation_returns_none() {
        let points = vec![Point::new(0.0, 0.0, 10.0), Point::new(1.0, 0.0, 10.0)];
        let cfg = cfg(KernelVariant::Classic);
        let cancel = AtomicBool::new(true);
        assert!(mean_shift_cancellable(&points, &cfg, &cancel).is_none());
    }

    #[test]
    fn translation_invariance() {
        let points = vec![
            Point::new(0.0, 0.0, 10.0),
            Point::new(1.0, 0.5, 11.0),
            Point::new(100.0, 0.0, 10.0),
        ];
        let shifted: Vec<Point> = points
            .iter()
            .map(|p| Point::new(p.x + 5.0, p.y - 3.0, p.z))
            .collect();
        let cfg = cfg(KernelVariant::Improved);
        let moded = mean_shift(&points, &cfg);
        let moded_shifted = mean_shift(&shifted, &cfg);
        for (a, b) in moded.iter().zip(moded_shifted.iter()) {
            assert!((b.mode.x - (a.mode.x + 5.0)).abs() < 1e-9);
            assert!((b.mode.y - (a.mode.y - 3.0)).abs() < 1e-9);
            assert!((b.mode.z - a.mode.z).abs() < 1e-9);
        }
    }
}
