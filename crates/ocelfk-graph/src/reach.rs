//! Inclusion filtering over the final schema graph.
//!
//! Event and object types are included when an admitted event-to-object
//! relation touches them. Relations are included when every endpoint is.

use std::collections::BTreeSet;

use ocelfk_core::error::DeriveError;
use ocelfk_core::relation::{RelationKey, RelationKind};
use serde::Serialize;
use tracing::{info, instrument};

use crate::build::{SchemaGraph, SchemaNode};

/// Included sets, all keyed by normalized names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inclusion {
    pub event_types: BTreeSet<String>,
    pub object_types: BTreeSet<String>,
    pub e2o: BTreeSet<RelationKey>,
    pub o2o: BTreeSet<RelationKey>,
}

/// Compute the included sets of `graph`.
///
/// Rejected object-to-object candidates never became nodes, so every
/// object-to-object relation node seen here was accepted.
///
/// # Errors
///
/// Returns [`DeriveError::EmptyResult`] when no event type, object type or
/// event-to-object relation is included.
#[instrument(skip(graph))]
pub fn included(graph: &SchemaGraph, lead: &str) -> Result<Inclusion, DeriveError> {
    let mut inclusion = Inclusion::default();

    for (key, endpoints) in graph.relations() {
        if key.kind != RelationKind::E2O {
            continue;
        }
        for endpoint in endpoints {
            match endpoint {
                SchemaNode::EventType(name) => {
                    inclusion.event_types.insert(name.clone());
                }
                SchemaNode::ObjectType(name) => {
                    inclusion.object_types.insert(name.clone());
                }
                SchemaNode::Relation(_) => {}
            }
        }
    }

    for (key, endpoints) in graph.relations() {
        let all_included = endpoints.iter().all(|endpoint| match endpoint {
            SchemaNode::EventType(name) => inclusion.event_types.contains(name),
            SchemaNode::ObjectType(name) => inclusion.object_types.contains(name),
            SchemaNode::Relation(_) => false,
        });
        if !all_included {
            continue;
        }
        let set = match key.kind {
            RelationKind::E2O => &mut inclusion.e2o,
            RelationKind::O2O => &mut inclusion.o2o,
        };
        set.insert(key.clone());
    }

    let empty = |what: &'static str| DeriveError::EmptyResult {
        stage: "inclusion filtering",
        what,
        lead: lead.to_string(),
    };
    if inclusion.event_types.is_empty() {
        return Err(empty("event types"));
    }
    if inclusion.object_types.is_empty() {
        return Err(empty("object types"));
    }
    if inclusion.e2o.is_empty() {
        return Err(empty("event-object relations"));
    }

    info!(
        event_types = inclusion.event_types.len(),
        object_types = inclusion.object_types.len(),
        e2o = inclusion.e2o.len(),
        o2o = inclusion.o2o.len(),
        "computed included sets"
    );
    Ok(inclusion)
}
