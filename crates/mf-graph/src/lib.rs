//! `mf-graph` — road-section graph, connectivity analysis, and routing.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                  |
//! |---------------|-----------------------------------------------------------|
//! | [`graph`]     | `RoadNode`, `RoadGraph` (id-keyed, back-filled links)     |
//! | [`builder`]   | `GraphBuilder` — parsed map → `RoadGraph`                 |
//! | [`partition`] | `Partitioner` — weakly-connected submap discovery         |
//! | [`routing`]   | `RouteVerifier` — waypoint-chain reachability checks      |
//! | [`error`]     | `GraphError`, `GraphResult<T>`                            |
//!
//! # Units and direction
//!
//! Node weights are centerline lengths in metres; the cost of a route step is
//! the length of the node being *entered*. Routing follows `children` edges
//! only (the successor relation); partitioning deliberately ignores direction
//! and walks both link sets.

pub mod builder;
pub mod error;
pub mod graph;
pub mod partition;
pub mod routing;


pub use builder::{normalize_section_id, GraphBuilder};
pub use error::{GraphError, GraphResult};
pub use graph::{RoadGraph, RoadNode};
pub use partition::{Partition, Partitioner, Submap};
pub use routing::{RouteCheckResult, RouteSegment, RouteSummary, RouteVerifier, WaypointError};
