//! Property tests over randomly generated logs.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::connected_components;
use proptest::prelude::*;
use proptest::sample::Index;
use serde_json::json;

use ocelfk_core::config::{CyclePolicy, DeriveConfig};
use ocelfk_core::error::DeriveError;
use ocelfk_core::cardinality::Cardinality;
use ocelfk_core::log::EventLog;
use ocelfk_core::normalize::normalize_identifier;
use ocelfk_core::relation::{RelationKey, RelationKind};
use ocelfk_graph::build::SchemaGraphBuilder;
use ocelfk_graph::{SchemaGraph, derive};

const ACTIVITIES: [&str; 3] = ["create", "update", "close"];
const OBJECT_TYPES: [&str; 3] = ["order", "item", "invoice"];

fn build_log(
    events: &[usize],
    objects: &[usize],
    relations: &[(Index, Index)],
    object_relations: &[(Index, Index)],
) -> EventLog {
    let events_json: Vec<_> = events
        .iter()
        .enumerate()
        .map(|(i, a)| json!({"id": format!("e{i}"), "activity": ACTIVITIES[*a], "timestamp": "2024-01-01T00:00:00Z"}))
        .collect();
    let objects_json: Vec<_> = objects
        .iter()
        .enumerate()
        .map(|(i, t)| json!({"id": format!("o{i}"), "type": OBJECT_TYPES[*t]}))
        .collect();
    let relations_json: Vec<_> = relations
        .iter()
        .map(|(e, o)| {
            let (e, o) = (e.index(events.len()), o.index(objects.len()));
            json!({
                "event_id": format!("e{e}"),
                "object_id": format!("o{o}"),
                "activity": ACTIVITIES[events[e]],
                "object_type": OBJECT_TYPES[objects[o]],
            })
        })
        .collect();
    let o2o_json: Vec<_> = object_relations
        .iter()
        .map(|(s, t)| {
            let (s, t) = (s.index(objects.len()), t.index(objects.len()));
            json!({
                "source_id": format!("o{s}"),
                "source_type": OBJECT_TYPES[objects[s]],
                "target_id": format!("o{t}"),
                "target_type": OBJECT_TYPES[objects[t]],
            })
        })
        .collect();

    serde_json::from_value(json!({
        "events": events_json,
        "objects": objects_json,
        "relations": relations_json,
        "object_relations": o2o_json,
    }))
    .expect("generated log must parse")
}

fn arb_log() -> impl Strategy<Value = EventLog> {
    (
        prop::collection::vec(0usize..ACTIVITIES.len(), 1..8),
        prop::collection::vec(0usize..OBJECT_TYPES.len(), 1..8),
        prop::collection::vec((any::<Index>(), any::<Index>()), 0..20),
        prop::collection::vec((any::<Index>(), any::<Index>()), 0..10),
    )
        .prop_map(|(events, objects, relations, o2o)| build_log(&events, &objects, &relations, &o2o))
}

fn arb_config() -> impl Strategy<Value = DeriveConfig> {
    (any::<bool>(), any::<bool>()).prop_map(|(scope_to_lead, global)| DeriveConfig {
        scope_to_lead,
        cycle_policy: if global { CyclePolicy::Global } else { CyclePolicy::Scoped },
        ..DeriveConfig::default()
    })
}

/// Event-to-object records grouped by normalized `(event type, object type)`:
/// record count and whether any event reaches two distinct objects.
fn e2o_shape(log: &EventLog, max_len: usize) -> BTreeMap<(String, String), (usize, bool)> {
    let mut partners: BTreeMap<(String, String), BTreeMap<&str, BTreeSet<&str>>> = BTreeMap::new();
    let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
    for r in &log.relations {
        let key = (
            normalize_identifier(&r.activity, max_len),
            normalize_identifier(&r.object_type, max_len),
        );
        *counts.entry(key.clone()).or_default() += 1;
        partners
            .entry(key)
            .or_default()
            .entry(r.event_id.as_str())
            .or_default()
            .insert(r.object_id.as_str());
    }
    counts
        .into_iter()
        .map(|(key, count)| {
            let multi = partners[&key].values().any(|objects| objects.len() > 1);
            (key, (count, multi))
        })
        .collect()
}

/// Independent cycles of an undirected graph: E - V + C.
fn cycle_rank(graph: &SchemaGraph) -> usize {
    let g = graph.graph();
    g.edge_count() + connected_components(g) - g.node_count()
}

proptest! {
    #[test]
    fn derivation_is_deterministic(log in arb_log(), config in arb_config()) {
        let lead = log.objects[0].object_type.clone();
        let first = derive(&log, &lead, &config);
        let second = derive(&log, &lead, &config);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn derived_schema_is_self_consistent(log in arb_log(), config in arb_config()) {
        let lead = log.objects[0].object_type.clone();
        let schema = match derive(&log, &lead, &config) {
            Ok(schema) => schema,
            Err(DeriveError::EmptyResult { .. }) => return Ok(()),
            Err(other) => return Err(TestCaseError::fail(other.to_string())),
        };

        // Every included relation has included endpoints.
        for relation in schema.relations() {
            let key = &relation.key;
            match key.kind {
                RelationKind::E2O => prop_assert!(schema.event_tables.contains_key(&key.source)),
                RelationKind::O2O => prop_assert!(schema.object_tables.contains_key(&key.source)),
            }
            prop_assert!(schema.object_tables.contains_key(&key.target));
        }

        // Every foreign key points between emitted tables.
        for fk in schema.foreign_keys() {
            let parent = schema.table(&fk.parent_table);
            let child = schema.table(&fk.child_table);
            prop_assert!(parent.is_some(), "missing parent {}", fk.parent_table);
            prop_assert!(child.is_some_and(|t| t.column(&fk.child_column).is_some()), "missing child {}", fk);
        }

        // Event-to-object admission never fails; rejected names are not included.
        for decision in &schema.decisions {
            if decision.key.kind == RelationKind::E2O {
                prop_assert!(decision.is_accepted());
            }
        }
        for rejected in &schema.rejected {
            prop_assert!(schema.o2o.iter().all(|r| &r.key != rejected));
        }

        // Event-to-object cardinality decides between an inlined column and a
        // linking table, judged against the raw records.
        let shape = e2o_shape(&log, config.max_identifier_len);
        for relation in &schema.e2o {
            let key = &relation.key;
            let Some(&(count, multi)) = shape.get(&(key.source.clone(), key.target.clone())) else {
                return Err(TestCaseError::fail(format!("{key} has no records")));
            };
            let event_table = &schema.event_tables[&key.source];
            let link_name = format!("r_e_{}_{}_{}", schema.namespace, key.source, key.target);
            prop_assert_eq!(relation.record_count, count);
            if multi {
                prop_assert_eq!(relation.cardinality, Cardinality::Multi);
                let link = relation.link_table();
                prop_assert!(link.is_some_and(|t| t.name == link_name && t.row_count() == count));
                prop_assert!(event_table.column(&key.target).is_none());
            } else {
                prop_assert_eq!(relation.cardinality, Cardinality::Functional);
                let inline = relation.inline_column();
                prop_assert!(inline.is_some_and(|c| c.owner_table == event_table.name && c.column == key.target));
                prop_assert!(event_table.column(&key.target).is_some());
                prop_assert!(schema.table(&link_name).is_none());
            }
        }

        // Every emitted event and object type is reached by an included
        // event-to-object relation.
        for event_type in schema.event_tables.keys() {
            prop_assert!(schema.e2o.iter().any(|r| &r.key.source == event_type), "orphan event {}", event_type);
        }
        for object_type in schema.object_tables.keys() {
            prop_assert!(schema.e2o.iter().any(|r| &r.key.target == object_type), "orphan object {}", object_type);
        }
    }

    #[test]
    fn o2o_admission_adds_no_cycles(
        e2o in prop::collection::vec((0usize..3, 0usize..4), 0..8),
        o2o in prop::collection::vec((0usize..4, 0usize..4), 0..10),
    ) {
        let events = ["A", "B", "C"];
        let objects = ["W", "X", "Y", "Z"];

        let mut builder = SchemaGraphBuilder::seed(events, objects);
        for (e, o) in &e2o {
            builder.admit_e2o(&RelationKey::e2o(events[*e], objects[*o]), 1);
        }
        let mut graph = builder.into_undirected();
        let before = cycle_rank(&graph);

        for (s, t) in &o2o {
            graph.admit_o2o(&RelationKey::o2o(objects[*s], objects[*t]), 1, CyclePolicy::Scoped);
        }
        prop_assert_eq!(cycle_rank(&graph), before);
    }
}
