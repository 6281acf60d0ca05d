//! Workspace for reusing allocated memory between repeated calls to
//! [`crate::segment_tree_crowns_inplace`].

use std::cell::RefCell;
use std::fmt;
use std::fmt::Debug;

use thread_local::ThreadLocal;

use crate::point::{LabeledPoint, Point};

/// Collection of all thread-local per-tile scratch buffers, plus the final output
/// buffer, reused across repeated segmentation calls to reduce allocations.
#[derive(Default)]
pub struct SegmentationWorkspace {
    output: Vec<LabeledPoint>,
    local_workspaces: ThreadLocal<RefCell<LocalTileWorkspace>>,
}

impl SegmentationWorkspace {
    /// Returns a mutable reference to the reusable output buffer.
    pub(crate) fn output_mut(&mut self) -> &mut Vec<LabeledPoint> {
        &mut self.output
    }

    /// Returns the labeled points written by the most recent in-place segmentation call.
    pub fn output(&self) -> &[LabeledPoint] {
        &self.output
    }

    /// Returns a reference to a thread-local per-tile scratch workspace, allocating one
    /// for the calling thread on first use.
    pub(crate) fn get_local(&self) -> &RefCell<LocalTileWorkspace> {
        self.local_workspaces.get_or_default()
    }
}

impl Clone for SegmentationWorkspace {
    /// Returns a new, empty workspace: allocated scratch memory is never shared between
    /// clones.
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl Debug for SegmentationWorkspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentationWorkspace").finish()
    }
}

/// Per-thread scratch buffers used while processing a single tile, reused across tiles
/// and across calls to avoid reallocating for every tile dispatched to a worker.
#[derive(Default)]
pub(crate) struct LocalTileWorkspace {
    pub modes: Vec<Point>,
    pub local_crown_ids: Vec<u64>,
    pub retain_mask: Vec<bool>,
}

impl LocalTileWorkspace {
    pub(crate) fn clear(&mut self) {
        self.modes.clear();
        self.local_crown_ids.clear();
        self.retain_mask.clear();
    }
}
