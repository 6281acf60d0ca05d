//! Core point types (§3): the immutable input point and the mode-augmented point
//! produced by the mean-shift engine.

use nalgebra::Point3;

/// A single LiDAR return: `(x, y, z)` in world coordinates, double precision.
///
/// An alias rather than a newtype so that the rest of the crate (and its callers) can
/// use `nalgebra`'s point arithmetic directly.
pub type Point = Point3<f64>;

/// A [`Point`] augmented with the coordinates of the density mode its mean-shift
/// iteration converged to (§3).
///
/// Invariant: `mode.z >= min_height` whenever the point survived the height cull,
/// since only points with `z >= min_height` ever participate in mean-shift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModedPoint {
    /// The original, unmodified input point.
    pub point: Point,
    /// The density mode this point's kernel converged to.
    pub mode: Point,
}

impl ModedPoint {
    /// Constructs a moded point from an original position and its converged mode.
    pub fn new(point: Point, mode: Point) -> Self {
        Self { point, mode }
    }
}

/// A [`ModedPoint`] augmented with the crown id assigned by the labeler/assembler.
///
/// `crown_id == 0` denotes "unclustered" / global noise (§3, §4.F).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledPoint {
    /// The original point and its converged mode.
    pub moded: ModedPoint,
    /// Globally unique crown id, or `0` for noise.
    pub crown_id: u64,
}
