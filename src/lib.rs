//!
//! Library for adaptive mean-shift tree crown segmentation of airborne LiDAR point
//! clouds. Entry point is the [segment_tree_crowns] function.
//!

/// Re-export the version of nalgebra used by this crate
pub use nalgebra;

/// Axis-aligned bounding boxes for tile cores and cloud extents
mod aabb;
/// Tile-stitching and concatenation of per-tile results into a global labeling
mod assemble;
/// Density-based clustering of converged modes into crown ids
pub mod cluster;
/// Configuration surface for the segmentation pipeline
pub mod config;
/// Parallel per-tile driver: the entry points of this crate
mod driver;
/// Error types returned by the public API
pub mod error;
/// Uniform-grid spatial index accelerating the mean-shift engine's and the mode
/// labeler's neighbor scans
mod grid_index;
/// AMS3D kernel functions: cylinder membership and mean-shift weights
pub mod kernel;
/// The adaptive mean-shift iterator
pub mod mean_shift;
/// Core point types shared across the pipeline
pub mod point;
/// Progress reporting callback used by the driver
pub mod progress;
/// Partitioning of a cloud's XY extent into overlapping tiles
pub mod tiling;
/// Workspace for reusing allocated memory between multiple segmentation calls
pub(crate) mod workspace;

pub use config::{Configuration, KernelVariant, MergeStrategy};
pub use driver::{
    segment_tree_crowns, segment_tree_crowns_cancellable, segment_tree_crowns_inplace,
    segment_tree_crowns_with_progress,
};
pub use error::{InvalidConfigField, SegmentationError};
pub use point::{LabeledPoint, ModedPoint, Point};
pub use progress::ProgressSink;
pub use workspace::SegmentationWorkspace;

// TODO: Feature flag to disable (debug level) logging?

pub(crate) type HashState = fxhash::FxBuildHasher;
pub(crate) type MapType<K, V> = std::collections::HashMap<K, V, HashState>;
pub(crate) fn new_map<K, V>() -> MapType<K, V> {
    MapType::with_hasher(HashState::default())
}
