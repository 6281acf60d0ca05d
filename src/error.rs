//! Error types returned by the public API of this crate.

use thiserror::Error as ThisError;

/// Error returned when a [`Configuration`](crate::config::Configuration) fails validation.
///
/// Carries the name of the offending field and a human-readable description of why the
/// value is invalid, so that callers (and logs) can pinpoint the bad parameter without
/// having to re-derive the validation rules themselves.
#[derive(Debug, Clone, ThisError)]
#[error("invalid configuration field `{field}`: {reason}")]
pub struct InvalidConfigField {
    /// Name of the configuration field that failed validation.
    pub field: &'static str,
    /// Human-readable reason the value was rejected.
    pub reason: String,
}

impl InvalidConfigField {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Error type returned when tree crown segmentation fails.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum SegmentationError {
    /// The supplied [`Configuration`](crate::config::Configuration) violates one of the
    /// invariants checked by `Configuration::validate`. Reported before any tile is
    /// dispatched; no partial work is performed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] InvalidConfigField),

    /// A worker task was cancelled cooperatively via the caller-supplied cancellation
    /// flag before all tiles completed. Distinct from [`SegmentationError::WorkerPanic`]
    /// because it is caller-initiated rather than an invariant violation.
    #[error("segmentation was cancelled before completion")]
    Cancelled,

    /// A worker task panicked while processing a tile, indicating an internal invariant
    /// violation. The remaining workers are stopped and the panic payload (when it can be
    /// turned into a string) is included for diagnostics.
    #[error("worker panicked while processing tile {tile_id:?}: {message}")]
    WorkerPanic {
        /// Spatial id of the tile being processed when the panic occurred.
        tile_id: (i64, i64),
        /// Best-effort string rendering of the panic payload.
        message: String,
    },

    /// Any error that is not represented by a more specific variant above, e.g. arising
    /// from an external collaborator (progress sink, etc).
    #[error("unknown error")]
    Unknown(#[from] anyhow::Error),
}
