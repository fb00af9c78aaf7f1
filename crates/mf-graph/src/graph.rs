//! Road-section graph representation.
//!
//! # Back-filled links
//!
//! Sections arrive in arbitrary order, and a section's predecessor/successor
//! declarations routinely name sections that have not been inserted yet.
//! [`RoadGraph::add_road`] therefore keeps both link directions consistent
//! incrementally: inserting a node also patches the opposite link set of
//! every already-present neighbor it names. As long as the source declares
//! links symmetrically (it does), the finished graph satisfies
//! `b ∈ a.children ⇔ a ∈ b.parents` for any insertion order.

use rustc_hash::{FxHashMap, FxHashSet};

/// One road section: a graph node with its length and both link directions.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RoadNode {
    pub id: String,
    /// Traversal cost of *entering* this node, in metres.
    pub length: f64,
    /// Predecessor section ids.
    pub parents: FxHashSet<String>,
    /// Successor section ids.
    pub children: FxHashSet<String>,
}

/// Directed road-section graph, keyed by section id.
///
/// Built once by [`GraphBuilder`](crate::builder::GraphBuilder) and consumed
/// read-only by partitioning and routing; no removal operation exists.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct RoadGraph {
    nodes: FxHashMap<String, RoadNode>,
}

impl RoadGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or overwrite) a node, back-filling the opposite link set of
    /// every parent or child already present in the graph.
    pub fn add_road(
        &mut self,
        id: &str,
        length: f64,
        parents: FxHashSet<String>,
        children: FxHashSet<String>,
    ) {
        for parent in &parents {
            if let Some(node) = self.nodes.get_mut(parent) {
                node.children.insert(id.to_owned());
            }
        }
        for child in &children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parents.insert(id.to_owned());
            }
        }
        self.nodes.insert(
            id.to_owned(),
            RoadNode {
                id: id.to_owned(),
                length,
                parents,
                children,
            },
        );
    }

    pub fn node(&self, id: &str) -> Option<&RoadNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids, in arbitrary order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RoadNode> {
        self.nodes.values()
    }

    /// Enumerate every simple path from `start` to `end` along `children`
    /// edges, cheapest first, stopping after `limit` paths have been found.
    ///
    /// Cost is the sum of entered-node lengths, matching the routing cost
    /// model. The on-path visited set makes cycles (including self-loops in
    /// pathological input) harmless.
    pub fn all_paths(&self, start: &str, end: &str, limit: usize) -> Vec<Vec<String>> {
        if limit == 0 || !self.nodes.contains_key(start) || !self.nodes.contains_key(end) {
            return Vec::new();
        }
        let mut found: Vec<(f64, Vec<String>)> = Vec::new();
        let mut path = vec![start.to_owned()];
        let mut on_path: FxHashSet<&str> = FxHashSet::default();
        on_path.insert(start);
        self.dfs_paths(start, end, 0.0, &mut path, &mut on_path, &mut found, limit);

        found.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        found.into_iter().map(|(_, p)| p).collect()
    }

    fn dfs_paths<'a>(
        &'a self,
        node: &str,
        end: &str,
        cost: f64,
        path: &mut Vec<String>,
        on_path: &mut FxHashSet<&'a str>,
        found: &mut Vec<(f64, Vec<String>)>,
        limit: usize,
    ) {
        if node == end {
            found.push((cost, path.clone()));
            return;
        }
        let Some(current) = self.nodes.get(node) else {
            return;
        };
        // Sorted expansion keeps enumeration order reproducible.
        let mut next: Vec<&String> = current.children.iter().collect();
        next.sort_unstable();
        for child in next {
            if found.len() >= limit || on_path.contains(child.as_str()) {
                continue;
            }
            let Some(child_node) = self.nodes.get(child) else {
                continue;
            };
            path.push(child.clone());
            on_path.insert(&child_node.id);
            self.dfs_paths(child, end, cost + child_node.length, path, on_path, found, limit);
            on_path.remove(child.as_str());
            path.pop();
        }
    }
}
