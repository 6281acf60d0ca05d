//! Axis-aligned bounding boxes used for the cloud's XY extent and per-tile bounds.

use nalgebra::Point3;

/// An axis-aligned bounding box in the XY plane, used to describe a tile's core and
/// buffered extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisAlignedBoundingBox2d {
    min: [f64; 2],
    max: [f64; 2],
}

impl AxisAlignedBoundingBox2d {
    /// Constructs a new box from explicit min/max corners. Panics in debug builds if
    /// `min` is not component-wise `<= max`.
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        debug_assert!(min[0] <= max[0] && min[1] <= max[1]);
        Self { min, max }
    }

    /// Lower-left corner of the box.
    pub fn min(&self) -> [f64; 2] {
        self.min
    }

    /// Upper-right corner of the box.
    pub fn max(&self) -> [f64; 2] {
        self.max
    }

    /// Returns a new box grown uniformly in all directions by `margin`.
    pub fn grown(&self, margin: f64) -> Self {
        Self {
            min: [self.min[0] - margin, self.min[1] - margin],
            max: [self.max[0] + margin, self.max[1] + margin],
        }
    }

    /// Returns `true` if the point `(x, y)` lies inside the box, using a half-open
    /// `[min, max)` convention on both axes (matches the tile core-region convention
    /// used by the tile splitter).
    pub fn contains_half_open(&self, x: f64, y: f64) -> bool {
        x >= self.min[0] && x < self.max[0] && y >= self.min[1] && y < self.max[1]
    }
}

/// An axis-aligned bounding box in 3D, used to describe the full extent of a point
/// cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisAlignedBoundingBox3d {
    min: Point3<f64>,
    max: Point3<f64>,
}

impl AxisAlignedBoundingBox3d {
    /// Computes the smallest box enclosing all given points. Returns `None` if `points`
    /// is empty.
    pub fn from_points(points: &[Point3<f64>]) -> Option<Self> {
        let mut iter = points.iter();
        let first = *iter.next()?;
        let mut aabb = Self {
            min: first,
            max: first,
        };
        for p in iter {
            aabb.extend(p);
        }
        Some(aabb)
    }

    /// Same as [`AxisAlignedBoundingBox3d::from_points`] but computed in parallel,
    /// using `rayon`'s reduce, for large clouds.
    pub fn from_points_par(points: &[Point3<f64>]) -> Option<Self> {
        use rayon::prelude::*;
        points
            .par_iter()
            .copied()
            .map(|p| Self { min: p, max: p })
            .reduce_with(|a, b| a.union(&b))
    }

    fn extend(&mut self, p: &Point3<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    fn union(&self, other: &Self) -> Self {
        Self {
            min: Point3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Point3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// Lower corner of the box.
    pub fn min(&self) -> Point3<f64> {
        self.min
    }

    /// Upper corner of the box.
    pub fn max(&self) -> Point3<f64> {
        self.max
    }

    /// The box's extent projected onto the XY plane.
    pub fn xy(&self) -> AxisAlignedBoundingBox2d {
        AxisAlignedBoundingBox2d::new([self.min.x, self.min.y], [self.max.x, self.max.y])
    }
}
