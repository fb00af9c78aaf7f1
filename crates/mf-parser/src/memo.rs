//! Parser for the proprietary "memo" JSON map dialect.
//!
//! Memo dumps come from an online mapping pipeline and are routinely
//! partially broken, so this parser is per-item tolerant: each lane, line,
//! road, and object is resolved independently, and one that fails (bad JSON
//! shape, dangling reference) is skipped with a warning in the result's log
//! list instead of failing the parse. Only a syntactically invalid document
//! is fatal.
//!
//! Polyline coefficient geometry and UTM node coordinates are left
//! unresolved; downstream consumers need identity, topology, and declared
//! lengths only.

use mf_core::{LogEntry, Severity};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::ParseResult;

// ── Raw document shape ────────────────────────────────────────────────────────

/// Top-level memo document. Item values stay as raw JSON until individually
/// resolved, so one malformed entry cannot fail the whole deserialization.
#[derive(Debug, Default, serde::Deserialize)]
struct MemoDocument {
    #[serde(default)]
    lanes: FxHashMap<String, Value>,
    #[serde(default)]
    lines: FxHashMap<String, Value>,
    #[serde(default)]
    roads: FxHashMap<String, Value>,
    #[serde(default)]
    objects: FxHashMap<String, Value>,
}

#[derive(Debug, serde::Deserialize)]
struct MemoLaneData {
    road_id: String,
    centerline: String,
    left_border: String,
    right_border: String,
    #[serde(default)]
    pres: Vec<String>,
    #[serde(default)]
    sucs: Vec<String>,
    #[serde(default)]
    lane_type: Option<String>,
    #[serde(default)]
    turn_type: Option<String>,
    #[serde(default)]
    max_speed: Option<i64>,
    #[serde(default)]
    min_speed: Option<i64>,
}

#[derive(Debug, serde::Deserialize)]
struct MemoLineData {
    #[serde(default)]
    border_type: Option<String>,
    #[serde(default)]
    border_color: Option<String>,
    #[serde(default)]
    length: Option<f64>,
    #[serde(default)]
    nodes: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
struct MemoRoadData {
    #[serde(default)]
    lane_ids: Vec<String>,
    #[serde(default)]
    pres: Vec<String>,
    #[serde(default)]
    ins_status: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct MemoObjectData {
    #[serde(rename = "type")]
    object_type: String,
    #[serde(default)]
    outline: Vec<String>,
}

// ── Resolved domain objects ───────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct MemoLine {
    pub id: String,
    pub border_type: Option<String>,
    pub border_color: Option<String>,
    /// Declared length in metres, when present.
    pub length: Option<f64>,
    pub node_count: usize,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct MemoLane {
    pub id: String,
    pub road_id: String,
    /// Line id of the lane's centerline.
    pub centerline: String,
    pub left_border: String,
    pub right_border: String,
    /// Predecessor lane ids.
    pub pres: Vec<String>,
    /// Successor lane ids.
    pub sucs: Vec<String>,
    pub lane_type: Option<String>,
    pub turn_type: Option<String>,
    pub max_speed: Option<i64>,
    pub min_speed: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct MemoRoad {
    pub id: String,
    pub lane_ids: Vec<String>,
    /// Predecessor road ids (memo links roads directly, unlike Apollo).
    pub pres: Vec<String>,
    pub ins_status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct MemoObject {
    pub id: String,
    pub object_type: String,
    /// Outline node ids (two for a stop line).
    pub outline: Vec<String>,
}

/// The parsed memo result, plus the warnings accumulated while resolving it.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct MemoMap {
    pub roads: FxHashMap<String, MemoRoad>,
    pub lanes: FxHashMap<String, MemoLane>,
    pub lines: FxHashMap<String, MemoLine>,
    pub objects: FxHashMap<String, MemoObject>,
    /// Per-item resolution warnings; merged into the build-job log.
    pub logs: Vec<LogEntry>,
}

impl MemoMap {
    fn warn_skip(&mut self, what: &str, id: &str, reason: impl std::fmt::Display) {
        debug!(what, id, %reason, "skipping memo item");
        self.logs.push(LogEntry::new(
            Severity::Warning,
            format!("{what} {id}: {reason}"),
        ));
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Parse a memo JSON document.
///
/// Lines resolve first, then lanes (which reference lines), then roads
/// (which reference lanes), then objects — each tier only sees the items
/// that survived the tier below.
pub fn parse_memo(json: &str) -> ParseResult<MemoMap> {
    let doc: MemoDocument = serde_json::from_str(json)?;
    let mut map = MemoMap::default();

    for (id, value) in &doc.lines {
        match serde_json::from_value::<MemoLineData>(value.clone()) {
            Ok(line) => {
                map.lines.insert(
                    id.clone(),
                    MemoLine {
                        id: id.clone(),
                        border_type: line.border_type,
                        border_color: line.border_color,
                        length: line.length,
                        node_count: line.nodes.len(),
                    },
                );
            }
            Err(e) => map.warn_skip("line", id, e),
        }
    }

    for (id, value) in &doc.lanes {
        let lane = match serde_json::from_value::<MemoLaneData>(value.clone()) {
            Ok(lane) => lane,
            Err(e) => {
                map.warn_skip("lane", id, e);
                continue;
            }
        };
        // A lane whose borders or centerline never resolved is unusable.
        if let Some(missing) = [&lane.centerline, &lane.left_border, &lane.right_border]
            .into_iter()
            .find(|line_id| !map.lines.contains_key(*line_id))
        {
            let reason = format!("references unknown line {missing}");
            map.warn_skip("lane", id, reason);
            continue;
        }
        map.lanes.insert(
            id.clone(),
            MemoLane {
                id: id.clone(),
                road_id: lane.road_id,
                centerline: lane.centerline,
                left_border: lane.left_border,
                right_border: lane.right_border,
                pres: lane.pres,
                sucs: lane.sucs,
                lane_type: lane.lane_type,
                turn_type: lane.turn_type,
                max_speed: lane.max_speed,
                min_speed: lane.min_speed,
            },
        );
    }

    for (id, value) in &doc.roads {
        let road = match serde_json::from_value::<MemoRoadData>(value.clone()) {
            Ok(road) => road,
            Err(e) => {
                map.warn_skip("road", id, e);
                continue;
            }
        };
        if road.lane_ids.is_empty() {
            map.warn_skip("road", id, "has no lanes");
            continue;
        }
        if let Some(missing) = road.lane_ids.iter().find(|l| !map.lanes.contains_key(*l)) {
            let reason = format!("references unknown lane {missing}");
            map.warn_skip("road", id, reason);
            continue;
        }
        map.roads.insert(
            id.clone(),
            MemoRoad {
                id: id.clone(),
                lane_ids: road.lane_ids,
                pres: road.pres,
                ins_status: road.ins_status,
            },
        );
    }

    for (id, value) in &doc.objects {
        let object = match serde_json::from_value::<MemoObjectData>(value.clone()) {
            Ok(object) => object,
            Err(e) => {
                map.warn_skip("object", id, e);
                continue;
            }
        };
        if object.object_type != "stopline" {
            map.warn_skip("object", id, "type not supported yet");
            continue;
        }
        map.objects.insert(
            id.clone(),
            MemoObject {
                id: id.clone(),
                object_type: object.object_type,
                outline: object.outline,
            },
        );
    }

    Ok(map)
}
