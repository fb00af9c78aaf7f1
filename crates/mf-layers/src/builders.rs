//! One builder per layer kind.
//!
//! Builders are polymorphic over the source variant: the provided
//! [`LayerBuilder::build`] dispatches on the [`MapSource`] tag, and the memo
//! side defaults to a no-op (an empty row set) for layers the memo dialect
//! has no data for. Rows carry identity, topology, and attributes; geometry
//! synthesis happens in the excluded persistence layer.
//!
//! The lane and lane-connector builders join against
//! `BuildContext::lane_boundary_info`, which only the boundary builder
//! populates — their first attempt on an Apollo source fails transiently and
//! the pipeline requeues them.

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;
use serde_json::json;

use mf_parser::apollo::{ApolloLane, ApolloMap};
use mf_parser::memo::MemoMap;

use crate::context::{BoundaryInfo, BuildContext, LayerKind, LayerRow, MapSource};
use crate::error::BuildResult;

/// One named layer producer.
pub trait LayerBuilder {
    fn kind(&self) -> LayerKind;

    fn build_from_apollo(
        &self,
        map: &ApolloMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>>;

    /// Layers without memo data produce no rows for memo sources.
    fn build_from_memo(
        &self,
        map: &MemoMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        let _ = (map, ctx);
        Ok(Vec::new())
    }

    fn build(&self, source: &MapSource, ctx: &mut BuildContext) -> BuildResult<Vec<LayerRow>> {
        match source {
            MapSource::Apollo(map) => self.build_from_apollo(map, ctx),
            MapSource::Memo(map) => self.build_from_memo(map, ctx),
        }
    }
}

// ── Row helpers ───────────────────────────────────────────────────────────────

fn row(gid: u64, value: serde_json::Value) -> LayerRow {
    let properties = match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    LayerRow { gid, properties }
}

/// Road-section ids linked from/to by any of `lane_uids`, deduplicated and
/// sorted. Links to lanes the parse skipped resolve to nothing.
fn pre_suc_section_ids<'a>(
    map: &ApolloMap,
    lane_uids: impl Iterator<Item = &'a String>,
) -> (Vec<String>, Vec<String>) {
    let mut pre: BTreeSet<String> = BTreeSet::new();
    let mut suc: BTreeSet<String> = BTreeSet::new();
    for uid in lane_uids {
        let Some(lane) = map.lanes.get(uid) else {
            continue;
        };
        pre.extend(
            lane.link
                .predecessors
                .iter()
                .filter_map(|p| map.lanes.get(p))
                .map(|l| l.road_section_id.clone()),
        );
        suc.extend(
            lane.link
                .successors
                .iter()
                .filter_map(|s| map.lanes.get(s))
                .map(|l| l.road_section_id.clone()),
        );
    }
    (pre.into_iter().collect(), suc.into_iter().collect())
}

/// The full lane property row, shared by the lane and lane-connector layers.
fn lane_row(ctx: &BuildContext, lane: &ApolloLane, info: BoundaryInfo) -> LayerRow {
    let mut left_same = Vec::new();
    let mut right_same = Vec::new();
    let mut left_opposite = Vec::new();
    let mut right_opposite = Vec::new();
    for neighbor in &lane.link.neighbors {
        let bucket = match (neighbor.side.as_str(), neighbor.direction.as_str()) {
            ("left", "same") => &mut left_same,
            ("right", "same") => &mut right_same,
            ("left", _) => &mut left_opposite,
            _ => &mut right_opposite,
        };
        bucket.push(neighbor.uid.clone());
    }

    row(
        ctx.next_gid(),
        json!({
            "road_id": lane.road_id,
            "road_section_id": lane.road_section_id,
            "lane_id": lane.id,
            "lane_uid": lane.uid,
            "lane_type": lane.lane_type,
            "turn_type": lane.turn_type,
            "direction": lane.direction,
            "is_virtual": lane.is_virtual(),
            "length": lane.length,
            "border_type": lane.border.type_or_unknown(),
            "border_color": lane.border.color_or_unknown(),
            "speed_limit": lane.speed_limit,
            "predecessor_lane_uids": lane.link.predecessors,
            "successor_lane_uids": lane.link.successors,
            "left_same_neighbor_lane_uids": left_same,
            "right_same_neighbor_lane_uids": right_same,
            "left_opposite_neighbor_lane_uids": left_opposite,
            "right_opposite_neighbor_lane_uids": right_opposite,
            "signal_references": lane.signal_refs,
            "object_references": lane.object_refs,
            "junction_references": lane.junction_refs,
            "lane_references": lane.lane_refs,
            "left_boundary_gid": info.left_line_gid,
            "right_boundary_gid": info.right_line_gid,
        }),
    )
}

// ── Boundary layer ────────────────────────────────────────────────────────────

/// Builds the boundary rows and records `lane_boundary_info`.
pub struct LaneBoundaryBuilder;

impl LayerBuilder for LaneBoundaryBuilder {
    fn kind(&self) -> LayerKind {
        LayerKind::LaneBoundary
    }

    fn build_from_apollo(
        &self,
        map: &ApolloMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        let mut rows = Vec::new();

        for section in map.lane_sections.values() {
            for side in ["right", "left"] {
                let side_uids = if side == "left" {
                    &section.left_lanes
                } else {
                    &section.right_lanes
                };
                if side_uids.is_empty() {
                    continue;
                }

                // Reference lane first, then the side lanes in sorted order;
                // adjacent pairs share a boundary.
                let lanes: Vec<&ApolloLane> = std::iter::once(&section.ref_lane)
                    .chain(side_uids.iter())
                    .filter_map(|uid| map.lanes.get(uid))
                    .collect();

                let mut pending = Vec::with_capacity(lanes.len() + side_uids.len());
                let mut gids = Vec::with_capacity(lanes.len());
                for lane in &lanes {
                    let gid = ctx.next_gid();
                    pending.push(row(
                        gid,
                        json!({
                            "on_lane_uid": lane.uid,
                            "color": lane.border.color_or_unknown(),
                            "border_type": lane.border.type_or_unknown(),
                            "is_virtual": lane.border.is_virtual(),
                            "length": lane.border.length,
                            "is_left_border": false,
                        }),
                    ));
                    gids.push(gid);
                }

                // Pair each lane with the boundary it shares with its inner
                // neighbor; an explicit left border supersedes the shared one.
                let mut used: FxHashSet<u64> = FxHashSet::default();
                for (idx, pair) in gids.windows(2).enumerate() {
                    let lane = lanes[idx + 1];
                    let (mut left_gid, right_gid) = (pair[0], pair[1]);
                    if let Some(left_border) = &lane.left_border {
                        let gid = ctx.next_gid();
                        pending.push(row(
                            gid,
                            json!({
                                "on_lane_uid": lane.uid,
                                "color": left_border.color_or_unknown(),
                                "border_type": left_border.type_or_unknown(),
                                "is_virtual": left_border.is_virtual(),
                                "length": left_border.length,
                                "is_left_border": true,
                            }),
                        ));
                        left_gid = gid;
                    }
                    used.insert(left_gid);
                    used.insert(right_gid);
                    ctx.lane_boundary_info.insert(
                        lane.uid.clone(),
                        BoundaryInfo {
                            left_line_gid: left_gid,
                            right_line_gid: right_gid,
                        },
                    );
                }

                rows.extend(pending.into_iter().filter(|r| used.contains(&r.gid)));
            }
        }
        Ok(rows)
    }

    fn build_from_memo(
        &self,
        map: &MemoMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        let mut line_ids: BTreeSet<&str> = BTreeSet::new();
        for road in map.roads.values() {
            for lane_id in &road.lane_ids {
                if let Some(lane) = map.lanes.get(lane_id) {
                    line_ids.insert(&lane.left_border);
                    line_ids.insert(&lane.right_border);
                }
            }
        }

        let mut rows = Vec::new();
        for line_id in line_ids {
            let Some(line) = map.lines.get(line_id) else {
                continue;
            };
            rows.push(row(
                ctx.next_gid(),
                json!({
                    "line_id": line.id,
                    "border_type": line.border_type,
                    "border_color": line.border_color,
                    "length": line.length,
                    "node_count": line.node_count,
                }),
            ));
        }
        Ok(rows)
    }
}

// ── Lane layers ───────────────────────────────────────────────────────────────

/// Ordinary driving lanes — everything not on a junction connecting road.
pub struct LaneBuilder;

impl LayerBuilder for LaneBuilder {
    fn kind(&self) -> LayerKind {
        LayerKind::Lane
    }

    fn build_from_apollo(
        &self,
        map: &ApolloMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        let mut rows = Vec::new();
        for lane in map.lanes.values() {
            // Connector lanes get their own layer; reference lanes are not
            // traversable lanes at all.
            if ctx.is_connecting_road(&lane.road_id) || lane.id == 0 {
                continue;
            }
            let info = ctx.boundary_info(&lane.uid)?;
            rows.push(lane_row(ctx, lane, info));
        }
        Ok(rows)
    }

    fn build_from_memo(
        &self,
        map: &MemoMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        let mut rows = Vec::new();
        for road in map.roads.values() {
            for lane_id in &road.lane_ids {
                let Some(lane) = map.lanes.get(lane_id) else {
                    continue;
                };
                rows.push(row(
                    ctx.next_gid(),
                    json!({
                        "lane_id": lane.id,
                        "road_id": lane.road_id,
                        "centerline": lane.centerline,
                        "left_border": lane.left_border,
                        "right_border": lane.right_border,
                        "pres": lane.pres,
                        "sucs": lane.sucs,
                        "lane_type": lane.lane_type,
                        "turn_type": lane.turn_type,
                        "max_speed": lane.max_speed,
                        "min_speed": lane.min_speed,
                    }),
                ));
            }
        }
        Ok(rows)
    }
}

/// Lanes on junction connecting roads.
pub struct LaneConnectorBuilder;

impl LayerBuilder for LaneConnectorBuilder {
    fn kind(&self) -> LayerKind {
        LayerKind::LaneConnector
    }

    fn build_from_apollo(
        &self,
        map: &ApolloMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        let mut rows = Vec::new();
        for lane in map.lanes.values() {
            if !ctx.is_connecting_road(&lane.road_id) || lane.id == 0 {
                continue;
            }
            let info = ctx.boundary_info(&lane.uid)?;
            rows.push(lane_row(ctx, lane, info));
        }
        Ok(rows)
    }
}

// ── Signals and objects ───────────────────────────────────────────────────────

pub struct TrafficLightBuilder;

impl LayerBuilder for TrafficLightBuilder {
    fn kind(&self) -> LayerKind {
        LayerKind::TrafficLight
    }

    fn build_from_apollo(
        &self,
        map: &ApolloMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        let mut rows = Vec::new();
        for signal in map.signals.values() {
            if !signal.signal_type.eq_ignore_ascii_case("trafficlight") {
                continue;
            }
            let sub_signals: Vec<serde_json::Value> = signal
                .sub_signals
                .iter()
                .map(|sub| {
                    json!({
                        "self_id": format!("{}_{}", signal.id, sub.id),
                        "sub_signal_type": sub.sub_type,
                        "center_point": format!(
                            "{},{},{}",
                            sub.center[0], sub.center[1], sub.center[2]
                        ),
                    })
                })
                .collect();
            rows.push(row(
                ctx.next_gid(),
                json!({
                    "self_id": signal.id,
                    "layout_type": signal.layout_type,
                    "stopline_ref_ids": signal.stop_line_refs,
                    "sub_signals_info": sub_signals,
                }),
            ));
        }
        Ok(rows)
    }
}

pub struct StopLineBuilder;

impl LayerBuilder for StopLineBuilder {
    fn kind(&self) -> LayerKind {
        LayerKind::StopLine
    }

    fn build_from_apollo(
        &self,
        map: &ApolloMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        Ok(map
            .objects
            .values()
            .filter(|o| o.object_type == "stopline")
            .map(|o| {
                row(
                    ctx.next_gid(),
                    json!({ "self_id": o.id, "outline_points": o.outline_points }),
                )
            })
            .collect())
    }

    fn build_from_memo(
        &self,
        map: &MemoMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        Ok(map
            .objects
            .values()
            .map(|o| {
                row(
                    ctx.next_gid(),
                    json!({
                        "stop_line_id": o.id,
                        "type": o.object_type,
                        "outline": o.outline,
                    }),
                )
            })
            .collect())
    }
}

pub struct CrosswalkBuilder;

impl LayerBuilder for CrosswalkBuilder {
    fn kind(&self) -> LayerKind {
        LayerKind::Crosswalk
    }

    fn build_from_apollo(
        &self,
        map: &ApolloMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        Ok(map
            .objects
            .values()
            .filter(|o| o.object_type == "crosswalk")
            .map(|o| {
                row(
                    ctx.next_gid(),
                    json!({ "self_id": o.id, "outline_points": o.outline_points }),
                )
            })
            .collect())
    }
}

pub struct IntersectionBuilder;

impl LayerBuilder for IntersectionBuilder {
    fn kind(&self) -> LayerKind {
        LayerKind::Intersection
    }

    fn build_from_apollo(
        &self,
        map: &ApolloMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        let mut rows = Vec::new();
        for junction in map.junctions.values() {
            let connecting: Vec<&str> = junction
                .connections
                .iter()
                .map(|c| c.connecting_road.as_str())
                .collect();
            let incoming: Vec<&str> = junction
                .connections
                .iter()
                .map(|c| c.incoming_road.as_str())
                .collect();
            rows.push(row(
                ctx.next_gid(),
                json!({
                    "junction_id": junction.id,
                    "connecting_road_ids": connecting,
                    "incoming_road_ids": incoming,
                }),
            ));
        }
        Ok(rows)
    }
}

// ── Line layers ───────────────────────────────────────────────────────────────

pub struct BaselinePathBuilder;

impl LayerBuilder for BaselinePathBuilder {
    fn kind(&self) -> LayerKind {
        LayerKind::BaselinePath
    }

    fn build_from_apollo(
        &self,
        map: &ApolloMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        Ok(map
            .lanes
            .values()
            .map(|lane| {
                row(
                    ctx.next_gid(),
                    json!({
                        "lane_uid": lane.uid,
                        "is_virtual": lane.is_virtual(),
                        "length": lane.length,
                    }),
                )
            })
            .collect())
    }

    fn build_from_memo(
        &self,
        map: &MemoMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        let mut rows = Vec::new();
        for road in map.roads.values() {
            for lane_id in &road.lane_ids {
                let Some(lane) = map.lanes.get(lane_id) else {
                    continue;
                };
                rows.push(row(
                    ctx.next_gid(),
                    json!({
                        "lane_id": lane.id,
                        "road_id": lane.road_id,
                        "centerline": lane.centerline,
                    }),
                ));
            }
        }
        Ok(rows)
    }
}

/// One group row per populated side of each lane section.
pub struct LaneGroupBuilder;

impl LayerBuilder for LaneGroupBuilder {
    fn kind(&self) -> LayerKind {
        LayerKind::LaneGroup
    }

    fn build_from_apollo(
        &self,
        map: &ApolloMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        let mut rows = Vec::new();
        for road in map.roads.values() {
            for section_id in &road.sections {
                let Some(section) = map.lane_sections.get(section_id) else {
                    continue;
                };
                for (side, uids) in [
                    ("left", &section.left_lanes),
                    ("right", &section.right_lanes),
                ] {
                    if uids.is_empty() {
                        continue;
                    }
                    let (pre, suc) = pre_suc_section_ids(map, uids.iter());
                    rows.push(row(
                        ctx.next_gid(),
                        json!({
                            "road_section_id": section.road_section_id,
                            "road_type": road.road_type,
                            "lane_uids": uids,
                            "side_on_ref_line": side,
                            "junction_id": road.junction,
                            "pre_road_section_ids": pre,
                            "suc_road_section_ids": suc,
                        }),
                    ));
                }
            }
        }
        Ok(rows)
    }

    fn build_from_memo(
        &self,
        map: &MemoMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        Ok(map
            .roads
            .values()
            .map(|road| {
                row(
                    ctx.next_gid(),
                    json!({
                        "road_id": road.id,
                        "lane_ids": road.lane_ids,
                        "pres": road.pres,
                        "ins_status": road.ins_status,
                    }),
                )
            })
            .collect())
    }
}

/// One row per lane section's reference line.
pub struct ReferenceLineBuilder;

impl LayerBuilder for ReferenceLineBuilder {
    fn kind(&self) -> LayerKind {
        LayerKind::ReferenceLine
    }

    fn build_from_apollo(
        &self,
        map: &ApolloMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        let mut rows = Vec::new();
        for road in map.roads.values() {
            for section_id in &road.sections {
                let Some(section) = map.lane_sections.get(section_id) else {
                    continue;
                };
                let (pre, suc) = pre_suc_section_ids(
                    map,
                    section.left_lanes.iter().chain(section.right_lanes.iter()),
                );
                rows.push(row(
                    ctx.next_gid(),
                    json!({
                        "road_section_id": section.road_section_id,
                        "left_backward_lane_uids": section.left_lanes,
                        "right_forward_lane_uids": section.right_lanes,
                        "road_type": road.road_type,
                        "junction_id": road.junction,
                        "pre_road_section_ids": pre,
                        "suc_road_section_ids": suc,
                    }),
                ));
            }
        }
        Ok(rows)
    }

    fn build_from_memo(
        &self,
        map: &MemoMap,
        ctx: &mut BuildContext,
    ) -> BuildResult<Vec<LayerRow>> {
        let mut rows = Vec::new();
        for line in map.lines.values() {
            if line.border_type.as_deref() != Some("ins") {
                continue;
            }
            rows.push(row(
                ctx.next_gid(),
                json!({
                    "line_id": line.id,
                    "border_type": line.border_type,
                    "border_color": line.border_color,
                    "length": line.length.unwrap_or(-1.0),
                    "node_count": line.node_count,
                }),
            ));
        }
        Ok(rows)
    }
}
