//! Weakly-connected submap discovery.
//!
//! Pop order from the remaining set determines only which component gets
//! which `submap_N` label, never component membership, so the remaining set
//! is a `BTreeSet` — sorted pops give reproducible labels for fixtures and
//! for diffing two runs over the same map.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashSet;
use tracing::info;

use mf_core::ColorWheel;

use crate::graph::RoadGraph;

/// One maximal weakly-connected component.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Submap {
    /// Member section ids, sorted.
    pub roads: Vec<String>,
    /// Display color, `#rrggbb`.
    pub color: String,
}

/// The full partition: labeled submaps plus the isolated leftovers.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Partition {
    /// `submap_1`, `submap_2`, … labeled in discovery order. Serializes as
    /// a JSON object keyed by label.
    pub submaps: BTreeMap<String, Submap>,
    /// Sections with no parents or no children, grouped under one color.
    pub isolated: Submap,
}

/// Partitions a [`RoadGraph`] into submaps.
pub struct Partitioner {
    colors: ColorWheel,
}

impl Default for Partitioner {
    fn default() -> Self {
        Self::new()
    }
}

impl Partitioner {
    pub fn new() -> Self {
        Self {
            colors: ColorWheel::new(),
        }
    }

    /// Fixed color sequence, for reproducible output.
    pub fn with_color_wheel(colors: ColorWheel) -> Self {
        Self { colors }
    }

    /// Decompose the graph. Every section id lands in exactly one submap or
    /// in the isolated set.
    ///
    /// Only a node with links in *both* directions can seed a component
    /// walk; dead ends and sources are swept into a submap when a walk
    /// reaches them. Whatever no walk reaches is isolated. Deciding
    /// isolation after discovery (rather than per popped node) is what
    /// makes membership a pure function of topology, independent of pop
    /// order.
    pub fn partition(&mut self, graph: &RoadGraph) -> Partition {
        let mut remaining: BTreeSet<&str> = graph.ids().collect();
        let mut submaps = BTreeMap::new();

        for seed in graph.ids().collect::<BTreeSet<_>>() {
            if !remaining.contains(seed) {
                continue;
            }
            // Ids in remaining always come from the graph, node() cannot miss.
            let Some(node) = graph.node(seed) else {
                continue;
            };
            if node.parents.is_empty() || node.children.is_empty() {
                continue;
            }

            let mut members = walk_undirected(graph, seed);
            for id in &members {
                remaining.remove(id.as_str());
            }
            members.sort_unstable();
            submaps.insert(
                format!("submap_{}", submaps.len() + 1),
                Submap {
                    roads: members,
                    color: self.colors.next_color(),
                },
            );
        }

        let isolated_roads: Vec<String> = remaining.into_iter().map(str::to_owned).collect();
        info!(
            submaps = submaps.len(),
            isolated = isolated_roads.len(),
            "partitioned road graph"
        );
        Partition {
            submaps,
            isolated: Submap {
                roads: isolated_roads,
                color: self.colors.next_color(),
            },
        }
    }
}

/// Collect every graph id reachable from `seed` following links in both
/// directions. Iterative with an explicit stack; link targets absent from
/// the graph are dangling references and are skipped, not members.
fn walk_undirected(graph: &RoadGraph, seed: &str) -> Vec<String> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut stack = vec![seed];
    seen.insert(seed);

    while let Some(id) = stack.pop() {
        let Some(node) = graph.node(id) else {
            continue;
        };
        for neighbor in node.parents.iter().chain(node.children.iter()) {
            if graph.contains(neighbor) && seen.insert(neighbor) {
                stack.push(neighbor);
            }
        }
    }
    seen.into_iter().map(str::to_owned).collect()
}
