//! Layer-pipeline error type.

use thiserror::Error;

use crate::context::LayerKind;

/// Errors produced by `mf-layers`.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Transient: a builder referenced context data (typically
    /// `lane_boundary_info`) that an earlier-queued builder has not produced
    /// yet. The pipeline requeues the builder instead of propagating this.
    #[error("context entry {key} not yet available")]
    MissingContext { key: String },

    /// A layer kept hitting [`BuildError::MissingContext`] past the retry
    /// bound. Fatal; aborts the whole pipeline.
    #[error("layer {layer} failed {attempts} times: {reason}")]
    RetriesExhausted {
        layer: LayerKind,
        attempts: u32,
        reason: String,
    },
}

pub type BuildResult<T> = Result<T, BuildError>;
