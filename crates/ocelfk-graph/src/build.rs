//! Schema graph construction.
//!
//! # Overview
//!
//! Nodes are event types, object types and relation candidates. A relation
//! node is joined to its two endpoint type nodes (one, for a self relation).
//!
//! ## Phases
//!
//! ```text
//! SchemaGraphBuilder::seed()       every event and object type gets a node
//!        ↓  admit_e2o() × n         unconditional, directed type → relation
//! SchemaGraphBuilder::into_undirected()
//!        ↓  admit_o2o() × m         cycle-checked before mutation
//! SchemaGraph                      read-only input to reach::included()
//! ```
//!
//! ## Visit order
//!
//! [`e2o_rank`] and [`o2o_rank`] give the sort keys callers must visit
//! candidates in. Admission is order-dependent, so the order is part of
//! the contract.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;

use ocelfk_core::config::CyclePolicy;
use ocelfk_core::relation::{RelationKey, RelationKind};
use petgraph::graph::{DiGraph, NodeIndex, UnGraph};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cycles::{CycleWitness, would_close_cycle};

// ---------------------------------------------------------------------------
// Nodes and decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "node", content = "name", rename_all = "snake_case")]
pub enum SchemaNode {
    EventType(String),
    ObjectType(String),
    Relation(RelationKey),
}

impl fmt::Display for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EventType(name) => write!(f, "event {name}"),
            Self::ObjectType(name) => write!(f, "object {name}"),
            Self::Relation(key) => write!(f, "{} {key}", key.kind),
        }
    }
}

/// Outcome of admitting one relation candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Admission {
    Accepted,
    Rejected { witness: CycleWitness },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionDecision {
    pub key: RelationKey,
    pub record_count: usize,
    pub admission: Admission,
}

impl AdmissionDecision {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self.admission, Admission::Accepted)
    }
}

// ---------------------------------------------------------------------------
// Visit order
// ---------------------------------------------------------------------------

/// Sort key for event-to-object candidates: record count descending, then
/// name ascending.
#[must_use]
pub fn e2o_rank(key: &RelationKey, record_count: usize) -> (Reverse<usize>, String) {
    (Reverse(record_count), key.name())
}

/// Sort key for object-to-object candidates: lead type as source first,
/// then lead type as target, then record count descending, then name
/// ascending.
#[must_use]
pub fn o2o_rank(
    key: &RelationKey,
    record_count: usize,
    lead: &str,
) -> (Reverse<bool>, Reverse<bool>, Reverse<usize>, String) {
    (
        Reverse(key.source == lead),
        Reverse(key.target == lead),
        Reverse(record_count),
        key.name(),
    )
}

// ---------------------------------------------------------------------------
// Builder (directed phase)
// ---------------------------------------------------------------------------

/// Graph under construction while event-to-object relations go in.
#[derive(Debug, Default)]
pub struct SchemaGraphBuilder {
    graph: DiGraph<SchemaNode, ()>,
    index: HashMap<SchemaNode, NodeIndex>,
    decisions: Vec<AdmissionDecision>,
}

impl SchemaGraphBuilder {
    /// One node per event type and per object type.
    pub fn seed<'a>(
        event_types: impl IntoIterator<Item = &'a str>,
        object_types: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut builder = Self::default();
        for name in event_types {
            builder.node(SchemaNode::EventType(name.to_string()));
        }
        for name in object_types {
            builder.node(SchemaNode::ObjectType(name.to_string()));
        }
        builder
    }

    /// Admit an event-to-object relation. Always accepted; a pair admitted
    /// twice keeps its single node.
    pub fn admit_e2o(&mut self, key: &RelationKey, record_count: usize) {
        debug_assert_eq!(key.kind, RelationKind::E2O);
        let event = self.node(SchemaNode::EventType(key.source.clone()));
        let object = self.node(SchemaNode::ObjectType(key.target.clone()));
        let relation = self.node(SchemaNode::Relation(key.clone()));
        self.graph.update_edge(event, relation, ());
        self.graph.update_edge(object, relation, ());

        debug!(relation = %key, record_count, "admitted e2o relation");
        self.decisions.push(AdmissionDecision {
            key: key.clone(),
            record_count,
            admission: Admission::Accepted,
        });
    }

    /// Fold into an undirected graph, collapsing parallel edges. Node
    /// indices are preserved.
    #[must_use]
    pub fn into_undirected(self) -> SchemaGraph {
        let mut graph = UnGraph::with_capacity(self.graph.node_count(), self.graph.edge_count());
        for node in self.graph.raw_nodes() {
            graph.add_node(node.weight.clone());
        }
        for edge in self.graph.raw_edges() {
            graph.update_edge(edge.source(), edge.target(), ());
        }

        SchemaGraph {
            graph,
            index: self.index,
            decisions: self.decisions,
        }
    }

    fn node(&mut self, node: SchemaNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node) {
            return idx;
        }
        let idx = self.graph.add_node(node.clone());
        self.index.insert(node, idx);
        idx
    }
}

// ---------------------------------------------------------------------------
// SchemaGraph (undirected phase)
// ---------------------------------------------------------------------------

/// The undirected schema graph of one derivation run.
#[derive(Debug)]
pub struct SchemaGraph {
    graph: UnGraph<SchemaNode, ()>,
    index: HashMap<SchemaNode, NodeIndex>,
    decisions: Vec<AdmissionDecision>,
}

impl SchemaGraph {
    /// Admit an object-to-object relation unless it would close a cycle
    /// under `policy`. The check runs on the unmodified graph.
    ///
    /// An endpoint type without a node gets one first.
    pub fn admit_o2o(
        &mut self,
        key: &RelationKey,
        record_count: usize,
        policy: CyclePolicy,
    ) -> &AdmissionDecision {
        debug_assert_eq!(key.kind, RelationKind::O2O);

        let a = self.node(SchemaNode::ObjectType(key.source.clone()));
        let b = self.node(SchemaNode::ObjectType(key.target.clone()));

        let admission = match would_close_cycle(&self.graph, a, b, policy) {
            None => {
                let relation = self.node(SchemaNode::Relation(key.clone()));
                self.graph.update_edge(a, relation, ());
                self.graph.update_edge(b, relation, ());
                debug!(relation = %key, record_count, "admitted o2o relation");
                Admission::Accepted
            }
            Some(witness) => {
                warn!(relation = %key, %witness, "rejected o2o relation: would close a cycle");
                Admission::Rejected { witness }
            }
        };

        self.decisions.push(AdmissionDecision {
            key: key.clone(),
            record_count,
            admission,
        });
        let last = self.decisions.len() - 1;
        &self.decisions[last]
    }

    fn node(&mut self, node: SchemaNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node) {
            return idx;
        }
        let idx = self.graph.add_node(node.clone());
        self.index.insert(node, idx);
        idx
    }

    #[must_use]
    pub const fn graph(&self) -> &UnGraph<SchemaNode, ()> {
        &self.graph
    }

    #[must_use]
    pub fn node_index(&self, node: &SchemaNode) -> Option<NodeIndex> {
        self.index.get(node).copied()
    }

    /// Every admission decision, in visit order.
    #[must_use]
    pub fn decisions(&self) -> &[AdmissionDecision] {
        &self.decisions
    }

    /// Keys of rejected candidates, in visit order.
    #[must_use]
    pub fn rejected(&self) -> Vec<RelationKey> {
        self.decisions
            .iter()
            .filter(|d| !d.is_accepted())
            .map(|d| d.key.clone())
            .collect()
    }

    /// Relation nodes present in the graph with their endpoint type nodes.
    pub fn relations(&self) -> impl Iterator<Item = (&RelationKey, Vec<&SchemaNode>)> + '_ {
        self.graph.node_indices().filter_map(move |idx| match &self.graph[idx] {
            SchemaNode::Relation(key) => {
                let endpoints = self.graph.neighbors(idx).map(|n| &self.graph[n]).collect();
                Some((key, endpoints))
            }
            _ => None,
        })
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
