//! Graph-subsystem error type.

use thiserror::Error;

/// Errors produced by `mf-graph`.
///
/// Waypoint validation problems are *not* here — they are values
/// ([`crate::routing::WaypointError`]) handed back to the caller for
/// re-prompting, not failures of the build.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A road declares no lane sections at all. Exchange files guarantee at
    /// least one section per road, so this is malformed input, not a partial
    /// map.
    #[error("road {road} has no lane sections")]
    RoadWithoutSections { road: String },
}

pub type GraphResult<T> = Result<T, GraphError>;
