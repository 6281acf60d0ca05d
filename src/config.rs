//! Configuration surface for the AMS3D tree crown segmentation pipeline.

use crate::error::InvalidConfigField;

/// Selects which of the two AMS3D kernel formulations (§4.A) is used by the mean-shift
/// engine.
///
/// The two variants are genuinely different algorithms behind the same interface: they
/// are not numerically equivalent, so they are kept as separate code paths rather than a
/// shared formula gated by a flag (see [`crate::kernel`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelVariant {
    /// Reproduces the asymmetric, upper-¾-masked kernel from the original AMS3D
    /// publication (Ferraz et al. 2012).
    Classic,
    /// Branch-free approximation using a symmetric cylinder shifted upward by `h / 6`
    /// and a plain Epanechnikov weight, roughly twice as fast as `Classic`.
    Improved,
}

/// Selects which tile-stitching rule decides whether a point is retained by the tile
/// that produced it, when a crown spans more than one tile (§4.F, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// A point is retained by a tile if the mean position of all modes sharing its crown
    /// id lies within that tile's core (unclustered points use their own mode). This is
    /// the more robust default.
    ClusterCenter,
    /// A point is retained by a tile if its own mode's XY position, rounded to the
    /// nearest `core_width`-aligned cell, falls inside that tile's core. Cheaper than
    /// `ClusterCenter` since it needs no per-cluster centroid, at the cost of coarser
    /// boundary decisions.
    RoundedMode,
}

/// Parameters controlling the AMS3D tree crown segmentation pipeline.
///
/// There is deliberately no blanket [`Default`] impl: `crown_diameter_to_height` and
/// `crown_height_to_height` have no universally sane default, so callers are pointed at
/// [`Configuration::classic_defaults`] / [`Configuration::improved_defaults`] instead,
/// which fill in everything except those two ratios.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Ratio controlling the cylinder radius: `r = crown_diameter_to_height * cz * 0.5`.
    pub crown_diameter_to_height: f64,
    /// Ratio controlling the cylinder height: `h = crown_height_to_height * cz` (scaled
    /// further for [`KernelVariant::Improved`], see [`crate::kernel`]).
    pub crown_height_to_height: f64,
    /// Per-point iteration cap for the mean-shift engine.
    pub max_iterations: u32,
    /// Euclidean step length below which mean-shift iteration halts.
    pub convergence_epsilon: f64,
    /// Which kernel formulation the mean-shift engine uses.
    pub kernel_variant: KernelVariant,
    /// Points with `z < min_height` are dropped before mean-shift runs.
    pub min_height: f64,
    /// Edge length of a tile's disjoint core region.
    pub core_width: f64,
    /// Width of the overlapping buffer halo surrounding each tile's core.
    pub buffer_width: f64,
    /// Neighborhood radius used by the density-based mode labeler.
    pub cluster_eps: f64,
    /// Minimum neighbor count (inclusive) for a mode to be considered a cluster core
    /// point by the mode labeler.
    pub cluster_min_pts: usize,
    /// Which tile-stitching rule is used to resolve crowns that straddle tile
    /// boundaries.
    pub merge_strategy: MergeStrategy,
    /// Fraction of the available CPUs used to size the worker pool:
    /// `workers = max(1, floor(fraction * cpu_count))`.
    pub worker_fraction: f64,
    /// Whether the result assembler renumbers surviving crown ids to a dense `1..=k`
    /// range after stitching (ID `0`, "noise", is never touched).
    pub compact_ids: bool,
}

impl Configuration {
    /// A typical starting point for the [`KernelVariant::Classic`] kernel, with
    /// `crown_diameter_to_height` and `crown_height_to_height` left for the caller to
    /// fill in (they are highly species/region dependent).
    pub fn classic_defaults(crown_diameter_to_height: f64, crown_height_to_height: f64) -> Self {
        Self {
            crown_diameter_to_height,
            crown_height_to_height,
            max_iterations: 200,
            convergence_epsilon: 0.01,
            kernel_variant: KernelVariant::Classic,
            min_height: 2.0,
            core_width: 20.0,
            buffer_width: 10.0,
            cluster_eps: 1.0,
            cluster_min_pts: 1,
            merge_strategy: MergeStrategy::ClusterCenter,
            worker_fraction: 0.9,
            compact_ids: true,
        }
    }

    /// Same as [`Configuration::classic_defaults`] but selecting
    /// [`KernelVariant::Improved`].
    pub fn improved_defaults(crown_diameter_to_height: f64, crown_height_to_height: f64) -> Self {
        Self {
            kernel_variant: KernelVariant::Improved,
            ..Self::classic_defaults(crown_diameter_to_height, crown_height_to_height)
        }
    }

    /// Checks all configuration invariants, returning the first violation found.
    /// Called eagerly by [`crate::segment_tree_crowns`] before any tile is dispatched.
    pub fn validate(&self) -> Result<(), InvalidConfigField> {
        let checks: &[(bool, &'static str, &str)] = &[
            (
                self.crown_diameter_to_height > 0.0,
                "crown_diameter_to_height",
                "must be > 0",
            ),
            (
                self.crown_height_to_height > 0.0,
                "crown_height_to_height",
                "must be > 0",
            ),
            (self.max_iterations >= 1, "max_iterations", "must be >= 1"),
            (
                self.convergence_epsilon >= 0.0,
                "convergence_epsilon",
                "must be >= 0",
            ),
            (self.min_height >= 0.0, "min_height", "must be >= 0"),
            (self.core_width > 0.0, "core_width", "must be > 0"),
            (self.buffer_width >= 0.0, "buffer_width", "must be >= 0"),
            (self.cluster_eps > 0.0, "cluster_eps", "must be > 0"),
            (
                self.cluster_min_pts >= 1,
                "cluster_min_pts",
                "must be >= 1",
            ),
            (
                self.worker_fraction > 0.0 && self.worker_fraction <= 1.0,
                "worker_fraction",
                "must be in (0, 1]",
            ),
        ];

        for (ok, field, reason) in checks {
            if !ok {
                return Err(InvalidConfigField::new(field, reason.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Configuration::classic_defaults(0.5, 1.0).validate().unwrap();
        Configuration::improved_defaults(0.5, 1.0).validate().unwrap();
    }

    #[test]
    fn rejects_non_positive_core_width() {
        let mut cfg = Configuration::classic_defaults(0.5, 1.0);
        cfg.core_width = 0.0;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.field, "core_width");
    }

    #[test]
    fn rejects_negative_min_height() {
        let mut cfg = Configuration::classic_defaults(0.5, 1.0);
        cfg.min_height = -1.0;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.field, "min_height");
    }

    #[test]
    fn rejects_zero_max_iterations() {
        let mut cfg = Configuration::classic_defaults(0.5, 1.0);
        cfg.max_iterations = 0;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.field, "max_iterations");
    }

    #[test]
    fn rejects_worker_fraction_out_of_range() {
        let mut cfg = Configuration::classic_defaults(0.5, 1.0);
        cfg.worker_fraction = 1.5;
        assert_eq!(cfg.validate().unwrap_err().field, "worker_fraction");
        cfg.worker_fraction = 0.0;
        assert_eq!(cfg.validate().unwrap_err().field, "worker_fraction");
    }
}
