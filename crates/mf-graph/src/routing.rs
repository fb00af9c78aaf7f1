//! Waypoint-chain route verification.
//!
//! Given an ordered list of waypoint ids, the verifier checks each adjacent
//! pair for reachability with Dijkstra over `children` edges and stops at the
//! first unreachable pair. Unreachability is a reported outcome, not an
//! error; only malformed *input* (too few waypoints, ids missing from the
//! graph) produces the [`WaypointError`] value, and that before any graph
//! work happens.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;
use tracing::info;

use mf_core::ColorWheel;

use crate::builder::normalize_section_id;
use crate::graph::RoadGraph;

// ── Result shapes ─────────────────────────────────────────────────────────────

/// One verified waypoint pair.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RouteSegment {
    pub start_ref_lane_id: String,
    pub end_ref_lane_id: String,
    /// Section ids from start to end inclusive; empty when unreachable.
    pub path: Vec<String>,
    pub has_routing: bool,
    /// Display color, `#rrggbb`.
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RouteSummary {
    /// AND of all segment results, short-circuited at the first failure.
    pub has_routing: bool,
    /// The pair that failed, when one did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_failure_road_segment: Option<(String, String)>,
    /// The normalized waypoint chain that was checked.
    pub ref_lane_ids: Vec<String>,
}

/// The full verification result: segments keyed `road_seg_{idx}` plus the
/// summary. Pairs after the first failure are absent from `details`.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RouteCheckResult {
    pub summary: RouteSummary,
    pub details: FxHashMap<String, RouteSegment>,
}

/// Waypoint validation problems, returned as a value before any routing.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum WaypointError {
    /// Fewer than two waypoints survive normalization.
    TooFew { found: usize },
    /// Normalized ids with no node in the graph.
    UnknownIds { missing: Vec<String> },
}

// ── Verifier ──────────────────────────────────────────────────────────────────

/// Verifies waypoint chains against one [`RoadGraph`].
pub struct RouteVerifier<'g> {
    graph: &'g RoadGraph,
    colors: ColorWheel,
}

impl<'g> RouteVerifier<'g> {
    pub fn new(graph: &'g RoadGraph) -> Self {
        Self {
            graph,
            colors: ColorWheel::new(),
        }
    }

    /// Fixed color sequence, for reproducible output.
    pub fn with_color_wheel(graph: &'g RoadGraph, colors: ColorWheel) -> Self {
        Self { graph, colors }
    }

    /// Check reachability along `waypoints` (lane uids or section ids; each
    /// is normalized to its section id first).
    pub fn verify(&mut self, waypoints: &[String]) -> Result<RouteCheckResult, WaypointError> {
        let chain: Vec<String> = waypoints
            .iter()
            .map(|w| normalize_section_id(w))
            .collect();

        if chain.len() < 2 {
            return Err(WaypointError::TooFew { found: chain.len() });
        }
        let missing: Vec<String> = chain
            .iter()
            .filter(|id| !self.graph.contains(id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(WaypointError::UnknownIds { missing });
        }

        let mut details = FxHashMap::default();
        let mut has_routing = true;
        let mut first_failure = None;

        for (idx, pair) in chain.windows(2).enumerate() {
            let (start, end) = (&pair[0], &pair[1]);
            let path = shortest_path(self.graph, start, end);
            let reached = !path.is_empty();

            details.insert(
                format!("road_seg_{idx}"),
                RouteSegment {
                    start_ref_lane_id: start.clone(),
                    end_ref_lane_id: end.clone(),
                    path,
                    has_routing: reached,
                    color: self.colors.next_color(),
                },
            );

            if !reached {
                has_routing = false;
                first_failure = Some((start.clone(), end.clone()));
                break;
            }
        }

        info!(
            waypoints = chain.len(),
            has_routing, "verified waypoint chain"
        );
        Ok(RouteCheckResult {
            summary: RouteSummary {
                has_routing,
                first_failure_road_segment: first_failure,
                ref_lane_ids: chain,
            },
            details,
        })
    }
}

// ── Dijkstra ──────────────────────────────────────────────────────────────────

/// Single-pair shortest path over `children` edges. Cost of a step is the
/// length of the node entered. Returns the path start..=end, or empty when
/// `end` is unreachable.
fn shortest_path(graph: &RoadGraph, start: &str, end: &str) -> Vec<String> {
    let mut dist: FxHashMap<&str, f64> = FxHashMap::default();
    let mut prev: FxHashMap<&str, &str> = FxHashMap::default();
    dist.insert(start, 0.0);

    // Min-heap via Reverse; the id as secondary key breaks cost ties toward
    // the smallest id, keeping equal-cost results stable.
    let mut heap: BinaryHeap<Reverse<(OrderedFloat<f64>, &str)>> = BinaryHeap::new();
    heap.push(Reverse((OrderedFloat(0.0), start)));

    let mut settled_end = false;
    while let Some(Reverse((cost, id))) = heap.pop() {
        if dist.get(id).is_some_and(|best| cost.0 > *best) {
            continue; // stale heap entry
        }
        if id == end {
            settled_end = true;
            break;
        }
        let Some(node) = graph.node(id) else {
            continue;
        };
        for child in &node.children {
            // Dangling successor declarations have no node to enter.
            let Some(child_node) = graph.node(child) else {
                continue;
            };
            let next = cost.0 + child_node.length;
            if dist.get(child.as_str()).is_none_or(|best| next < *best) {
                dist.insert(child, next);
                prev.insert(child, &node.id);
                heap.push(Reverse((OrderedFloat(next), child.as_str())));
            }
        }
    }

    if !settled_end && start != end {
        return Vec::new();
    }

    let mut path = vec![end.to_owned()];
    let mut cur = end;
    while let Some(p) = prev.get(cur) {
        path.push((*p).to_owned());
        cur = p;
    }
    path.reverse();
    path
}
