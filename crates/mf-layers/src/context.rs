//! Shared build state: the source variant, layer/row types, and the context
//! every builder reads and writes.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;

use mf_core::{BuildLog, IdAllocator};
use mf_parser::{ApolloMap, MemoMap};

use crate::error::{BuildError, BuildResult};

/// The parsed source a build job runs against. Builders dispatch on the
/// variant; a builder with no behavior for one variant produces no rows for
/// it.
#[derive(Clone, Debug)]
pub enum MapSource {
    Apollo(ApolloMap),
    Memo(MemoMap),
}

/// The ten layer kinds a build job can produce.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Lane,
    LaneConnector,
    LaneBoundary,
    TrafficLight,
    StopLine,
    Crosswalk,
    Intersection,
    BaselinePath,
    LaneGroup,
    ReferenceLine,
}

impl LayerKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Lane => "lane",
            Self::LaneConnector => "lane_connector",
            Self::LaneBoundary => "lane_boundary",
            Self::TrafficLight => "traffic_light",
            Self::StopLine => "stop_line",
            Self::Crosswalk => "crosswalk",
            Self::Intersection => "intersection",
            Self::BaselinePath => "baseline_path",
            Self::LaneGroup => "lane_group",
            Self::ReferenceLine => "reference_line",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One emitted layer row: a job-unique surrogate gid plus the attribute
/// columns, JSON-shaped for the enclosing HTTP layer.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct LayerRow {
    pub gid: u64,
    #[serde(flatten)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Boundary gids recorded per lane uid by the boundary builder; the lane
/// builders join against this.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct BoundaryInfo {
    pub left_line_gid: u64,
    pub right_line_gid: u64,
}

/// State shared by all builders of one job.
pub struct BuildContext {
    /// Gid source, scoped to this job.
    pub ids: IdAllocator,
    /// Layers built so far.
    pub layers: BTreeMap<LayerKind, Vec<LayerRow>>,
    /// Lane uid → boundary gids. Empty until the boundary builder runs.
    pub lane_boundary_info: FxHashMap<String, BoundaryInfo>,
    /// Roads referenced as `connectingRoad` by a junction (Apollo only).
    pub connecting_road_ids: Vec<String>,
    /// The externally pollable job log.
    pub log: BuildLog,
}

impl BuildContext {
    pub fn new(source: &MapSource, log: BuildLog) -> Self {
        let connecting_road_ids = match source {
            MapSource::Apollo(map) => map.connecting_road_ids(),
            MapSource::Memo(_) => Vec::new(),
        };
        Self {
            ids: IdAllocator::new(),
            layers: BTreeMap::new(),
            lane_boundary_info: FxHashMap::default(),
            connecting_road_ids,
            log,
        }
    }

    pub fn next_gid(&self) -> u64 {
        self.ids.next_id()
    }

    /// Boundary gids for `lane_uid`; the transient failure with which the
    /// lane builders get requeued behind the boundary builder.
    pub fn boundary_info(&self, lane_uid: &str) -> BuildResult<BoundaryInfo> {
        self.lane_boundary_info
            .get(lane_uid)
            .copied()
            .ok_or_else(|| BuildError::MissingContext {
                key: format!("lane_boundary_info[{lane_uid}]"),
            })
    }

    pub fn is_connecting_road(&self, road_id: &str) -> bool {
        self.connecting_road_ids.iter().any(|id| id == road_id)
    }
}
