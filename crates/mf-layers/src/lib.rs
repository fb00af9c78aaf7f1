//! `mf-layers` — the layer build pipeline.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                  |
//! |--------------|-----------------------------------------------------------|
//! | [`context`]  | `MapSource`, `LayerKind`, `LayerRow`, `BuildContext`      |
//! | [`builders`] | One [`LayerBuilder`] per layer kind                       |
//! | [`pipeline`] | `Pipeline` — registry, build loop, bounded retry          |
//! | [`error`]    | `BuildError`, `BuildResult<T>`                            |
//!
//! # Retry model
//!
//! Builders run off a queue. A builder that trips over context data another
//! builder has not produced yet fails with the transient
//! [`BuildError::MissingContext`] and goes to the back of the queue; three
//! such failures for one layer kind escalate to the fatal
//! [`BuildError::RetriesExhausted`]. The lane builders depend on the
//! boundary builder's output this way on every Apollo build, so the retry
//! path is ordinary operation, not an edge case.

pub mod builders;
pub mod context;
pub mod error;
pub mod pipeline;

#[cfg(test)]
mod tests;

pub use builders::LayerBuilder;
pub use context::{BoundaryInfo, BuildContext, LayerKind, LayerRow, MapSource};
pub use error::{BuildError, BuildResult};
pub use pipeline::{build_all_layers, LayerSet, Pipeline};
