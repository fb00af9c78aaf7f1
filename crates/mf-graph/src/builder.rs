//! Graph construction from parsed source maps.
//!
//! Both dialects reduce to the same node shape: one graph node per road
//! section, weighted by the longest centerline among the section's lanes,
//! linked by the union of its lanes' predecessor/successor declarations.
//! Lanes within one section routinely cross-reference each other, which
//! after normalization shows up as a section naming itself — those
//! self-references are stripped before insertion.

use rustc_hash::FxHashSet;
use tracing::debug;

use mf_parser::apollo::ApolloMap;
use mf_parser::memo::MemoMap;

use crate::error::{GraphError, GraphResult};
use crate::graph::RoadGraph;

/// Normalize a lane uid to its routing section id: drop the trailing lane
/// index and re-append the canonical `_0` suffix (`"R7_2_-1"` → `"R7_2_0"`).
pub fn normalize_section_id(uid: &str) -> String {
    let head = uid.rsplit_once('_').map_or(uid, |(head, _)| head);
    format!("{head}_0")
}

/// Builds a [`RoadGraph`] from either parsed source dialect.
pub struct GraphBuilder;

impl GraphBuilder {
    /// Build the section graph from an Apollo parse result.
    ///
    /// One node per lane section; all of the section's lanes (reference lane
    /// included) contribute their links and lengths.
    pub fn from_apollo(map: &ApolloMap) -> GraphResult<RoadGraph> {
        let mut graph = RoadGraph::new();

        for road in map.roads.values() {
            if road.sections.is_empty() {
                return Err(GraphError::RoadWithoutSections {
                    road: road.id.clone(),
                });
            }
            for section_id in &road.sections {
                let Some(section) = map.lane_sections.get(section_id) else {
                    continue;
                };
                let node_id = format!("{}_0", section.road_section_id);

                let mut parents = FxHashSet::default();
                let mut children = FxHashSet::default();
                let mut length = 0f64;

                let lane_uids = section
                    .left_lanes
                    .iter()
                    .chain(section.right_lanes.iter())
                    .chain(std::iter::once(&section.ref_lane));
                for uid in lane_uids {
                    let Some(lane) = map.lanes.get(uid) else {
                        continue;
                    };
                    length = length.max(lane.length);
                    parents.extend(lane.link.predecessors.iter().map(|p| normalize_section_id(p)));
                    children.extend(lane.link.successors.iter().map(|s| normalize_section_id(s)));
                }

                parents.remove(&node_id);
                children.remove(&node_id);
                graph.add_road(&node_id, length, parents, children);
            }
        }

        debug!(nodes = graph.len(), "built road graph from apollo map");
        Ok(graph)
    }

    /// Build the section graph from a memo parse result.
    ///
    /// Memo roads stand in for sections directly: node id is the road id,
    /// links come from lane-level pre/suc references mapped through each
    /// lane's owning road, unioned with the road-level predecessor list.
    pub fn from_memo(map: &MemoMap) -> GraphResult<RoadGraph> {
        let mut graph = RoadGraph::new();

        for road in map.roads.values() {
            let mut parents: FxHashSet<String> = road.pres.iter().cloned().collect();
            let mut children = FxHashSet::default();
            let mut length = 0f64;

            for lane_id in &road.lane_ids {
                let Some(lane) = map.lanes.get(lane_id) else {
                    continue;
                };
                if let Some(line) = map.lines.get(&lane.centerline) {
                    length = length.max(line.length.unwrap_or(0.0));
                }
                parents.extend(
                    lane.pres
                        .iter()
                        .filter_map(|p| map.lanes.get(p))
                        .map(|l| l.road_id.clone()),
                );
                children.extend(
                    lane.sucs
                        .iter()
                        .filter_map(|s| map.lanes.get(s))
                        .map(|l| l.road_id.clone()),
                );
            }

            parents.remove(&road.id);
            children.remove(&road.id);
            graph.add_road(&road.id, length, parents, children);
        }

        debug!(nodes = graph.len(), "built road graph from memo map");
        Ok(graph)
    }
}
