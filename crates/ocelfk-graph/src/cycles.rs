//! Cycle checks for object-to-object admission.
//!
//! The schema graph is undirected once event-to-object relations are in. A
//! relation node joining `a` and `b` closes a cycle exactly when `a` and `b`
//! are distinct and already connected. Both checks here run before the
//! graph is mutated.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use ocelfk_core::config::CyclePolicy;
use petgraph::algo::is_cyclic_undirected;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::Serialize;

use crate::build::SchemaNode;

/// Why a candidate was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleWitness {
    /// The endpoints are already joined along `path` (node labels, from the
    /// source endpoint to the target endpoint).
    Connected { path: Vec<String> },
    /// The graph already holds a cycle. Only reported under
    /// [`CyclePolicy::Global`].
    Preexisting,
}

impl fmt::Display for CycleWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected { path } => write!(f, "already connected via {}", path.join(" - ")),
            Self::Preexisting => f.write_str("graph already contains a cycle"),
        }
    }
}

/// Would joining `a` and `b` through a new relation node leave a cycle?
///
/// `a == b` is a self relation: its node hangs off a single endpoint and
/// never closes a cycle of its own.
#[must_use]
pub fn would_close_cycle(
    graph: &UnGraph<SchemaNode, ()>,
    a: NodeIndex,
    b: NodeIndex,
    policy: CyclePolicy,
) -> Option<CycleWitness> {
    if a != b {
        if let Some(path) = connecting_path(graph, a, b) {
            return Some(CycleWitness::Connected { path });
        }
    }

    if policy == CyclePolicy::Global && has_cycle(graph) {
        return Some(CycleWitness::Preexisting);
    }

    None
}

#[must_use]
pub fn has_cycle(graph: &UnGraph<SchemaNode, ()>) -> bool {
    is_cyclic_undirected(graph)
}

/// Shortest path from `from` to `to`, as node labels.
#[must_use]
pub fn connecting_path(
    graph: &UnGraph<SchemaNode, ()>,
    from: NodeIndex,
    to: NodeIndex,
) -> Option<Vec<String>> {
    let mut queue: VecDeque<NodeIndex> = VecDeque::from([from]);
    let mut visited: HashSet<NodeIndex> = HashSet::from([from]);
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    while let Some(current) = queue.pop_front() {
        if current == to {
            return Some(reconstruct_path(graph, from, to, &parent));
        }
        for next in graph.neighbors(current) {
            if visited.insert(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }

    None
}

fn reconstruct_path(
    graph: &UnGraph<SchemaNode, ()>,
    from: NodeIndex,
    to: NodeIndex,
    parent: &HashMap<NodeIndex, NodeIndex>,
) -> Vec<String> {
    let mut nodes = vec![to];
    let mut cursor = to;
    while cursor != from {
        let Some(&prev) = parent.get(&cursor) else {
            break;
        };
        cursor = prev;
        nodes.push(cursor);
    }
    nodes.reverse();
    nodes.into_iter().map(|idx| label(graph, idx)).collect()
}

fn label(graph: &UnGraph<SchemaNode, ()>, idx: NodeIndex) -> String {
    graph
        .node_weight(idx)
        .map_or_else(|| format!("#{}", idx.index()), ToString::to_string)
}
