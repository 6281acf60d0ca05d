//! AMS3D kernel functions (§4.A): cylinder membership, and the Gaussian/Epanechnikov
//! weights that turn membership into a mean-shift contribution.
//!
//! [`KernelVariant::Classic`] and [`KernelVariant::Improved`] are genuinely different
//! algorithms, not the same formula toggled by a flag: they are implemented as two
//! independent free-function families dispatched once per mean-shift call, rather than
//! unified behind shared arithmetic.

use crate::config::KernelVariant;

/// Extra height scaling applied only by [`KernelVariant::Improved`]; has no counterpart
/// in [`KernelVariant::Classic`] (§9, open question on `cylinder_height_factor`).
pub const IMPROVED_HEIGHT_FACTOR: f64 = 0.75;
/// Height scaling applied by [`KernelVariant::Classic`] (identity, named for symmetry
/// with [`IMPROVED_HEIGHT_FACTOR`] so the asymmetry is visible at the call site).
pub const CLASSIC_HEIGHT_FACTOR: f64 = 1.0;

/// The geometric parameters of the adaptive cylinder kernel centered at a given
/// centroid height `cz`, resolved once per mean-shift iteration step.
#[derive(Debug, Clone, Copy)]
pub struct CylinderKernel {
    /// Horizontal radius of the cylinder.
    pub radius: f64,
    /// Vertical extent (full height) of the cylinder.
    pub height: f64,
    /// Vertical center of the cylinder (equal to `cz` for `Classic`, shifted upward for
    /// `Improved`).
    pub center_z: f64,
    variant: KernelVariant,
}

impl CylinderKernel {
    /// Resolves the cylinder's radius, height and vertical center from the centroid's
    /// current height `cz` and the configured ratios.
    pub fn for_centroid_height(
        cz: f64,
        crown_diameter_to_height: f64,
        crown_height_to_height: f64,
        variant: KernelVariant,
    ) -> Self {
        let radius = crown_diameter_to_height * cz * 0.5;
        let height_factor = match variant {
            KernelVariant::Classic => CLASSIC_HEIGHT_FACTOR,
            KernelVariant::Improved => IMPROVED_HEIGHT_FACTOR,
        };
        let height = crown_height_to_height * cz * height_factor;
        let center_z = match variant {
            KernelVariant::Classic => cz,
            KernelVariant::Improved => cz + height / 6.0,
        };
        Self {
            radius,
            height,
            center_z,
            variant,
        }
    }

    /// Returns `true` iff the candidate point `(px, py, pz)` lies inside the cylinder
    /// centered (horizontally) at `(cx, cy)`.
    pub fn contains(&self, cx: f64, cy: f64, px: f64, py: f64, pz: f64) -> bool {
        let dx = px - cx;
        let dy = py - cy;
        let within_radius = dx * dx + dy * dy <= self.radius * self.radius;
        let half_h = self.height / 2.0;
        let within_height = pz >= self.center_z - half_h && pz <= self.center_z + half_h;
        within_radius && within_height
    }

    /// Combined mean-shift weight for a candidate point already known to satisfy
    /// [`CylinderKernel::contains`].
    pub fn weight(&self, cx: f64, cy: f64, cz: f64, px: f64, py: f64, pz: f64) -> f64 {
        let horizontal = horizontal_weight(cx, cy, px, py, self.radius);
        let vertical = match self.variant {
            KernelVariant::Classic => vertical_weight_classic(cz, self.height, pz),
            KernelVariant::Improved => vertical_weight_improved(self.center_z, self.height, pz),
        };
        vertical * horizontal
    }
}

/// Gaussian horizontal weight: `exp(-5 * (dist_xy / r)^2)`. Shared by both kernel
/// variants.
pub fn horizontal_weight(cx: f64, cy: f64, px: f64, py: f64, radius: f64) -> f64 {
    let dist = (px - cx).hypot(py - cy);
    let d_h = dist / radius;
    (-5.0 * d_h * d_h).exp()
}

/// Epanechnikov vertical weight for [`KernelVariant::Classic`]: an asymmetric mask that
/// only selects the upper ¾ of the (symmetric-about-`cz`) cylinder, with a folded linear
/// distance inside the mask.
pub fn vertical_weight_classic(cz: f64, h: f64, pz: f64) -> f64 {
    let mask_lo = cz - h / 4.0;
    let mask_hi = cz + h / 2.0;
    if pz < mask_lo || pz > mask_hi {
        return 0.0;
    }
    let d_v = (mask_lo - pz).abs().min((mask_hi - pz).abs()) / (3.0 * h / 8.0);
    1.0 - (1.0 - d_v) * (1.0 - d_v)
}

/// Epanechnikov vertical weight for [`KernelVariant::Improved`]: symmetric about `mz`,
/// no mask since cylinder membership already gates which points are considered.
pub fn vertical_weight_improved(mz: f64, h: f64, pz: f64) -> f64 {
    let d_v = (mz - pz).abs() / (h / 2.0);
    1.0 - d_v * d_v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_height_uses_identity_factor() {
        let k = CylinderKernel::for_centroid_height(10.0, 0.5, 1.0, KernelVariant::Classic);
        assert_eq!(k.height, 10.0);
        assert_eq!(k.center_z, 10.0);
    }

    #[test]
    fn improved_height_uses_three_quarter_factor_and_shifts_center() {
        let k = CylinderKernel::for_centroid_height(10.0, 0.5, 1.0, KernelVariant::Improved);
        assert_eq!(k.height, 7.5);
        assert_eq!(k.center_z, 10.0 + 7.5 / 6.0);
    }

    #[test]
    fn radius_scales_with_height() {
        let k1 = CylinderKernel::for_centroid_height(10.0, 0.5, 1.0, KernelVariant::Classic);
        let k2 = CylinderKernel::for_centroid_height(20.0, 0.5, 1.0, KernelVariant::Classic);
        assert_eq!(k2.radius, 2.0 * k1.radius);
        assert_eq!(k2.height, 2.0 * k1.height);
    }

    #[test]
    fn contains_respects_radius_and_height() {
        let k = CylinderKernel::for_centroid_height(10.0, 0.5, 1.0, KernelVariant::Classic);
        assert!(k.contains(0.0, 0.0, 0.0, 0.0, 10.0));
        assert!(!k.contains(0.0, 0.0, 100.0, 0.0, 10.0));
        assert!(!k.contains(0.0, 0.0, 0.0, 0.0, 1000.0));
    }

    #[test]
    fn horizontal_weight_peaks_at_center() {
        let w_center = horizontal_weight(0.0, 0.0, 0.0, 0.0, 5.0);
        let w_edge = horizontal_weight(0.0, 0.0, 5.0, 0.0, 5.0);
        assert_eq!(w_center, 1.0);
        assert!(w_edge < w_center);
    }

    #[test]
    fn classic_vertical_weight_masks_lower_quarter() {
        // h = 8 -> mask is [cz - 2, cz + 4]
        assert_eq!(vertical_weight_classic(10.0, 8.0, 10.0 - 2.01), 0.0);
        assert!(vertical_weight_classic(10.0, 8.0, 10.0 - 1.0) > 0.0);
    }

    #[test]
    fn improved_vertical_weight_is_symmetric_about_center() {
        let w_above = vertical_weight_improved(10.0, 8.0, 12.0);
        let w_below = vertical_weight_improved(10.0, 8.0, 8.0);
        assert!((w_above - w_below).abs() < 1e-12);
    }
}
