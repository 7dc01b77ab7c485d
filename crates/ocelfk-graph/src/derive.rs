//! End-to-end schema derivation.
//!
//! ```text
//! EventLog ─ catalog ─ scope ─ catalog ─ materialize ─ classify
//!                                                        ↓
//!   DerivedSchema ← assemble ← reach::included ← build (e2o, fold, o2o)
//! ```

use std::collections::BTreeMap;

use ocelfk_core::cardinality::classify;
use ocelfk_core::catalog::TypeCatalog;
use ocelfk_core::config::{CyclePolicy, DeriveConfig};
use ocelfk_core::error::DeriveError;
use ocelfk_core::log::EventLog;
use ocelfk_core::materialize::{MaterializedRelation, Materializer, apply_inline};
use ocelfk_core::relation::{RelationCandidate, RelationKey, e2o_candidates, o2o_candidates};
use ocelfk_core::scope::scope_to_lead;
use ocelfk_core::table::{ForeignKey, Table};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::build::{AdmissionDecision, SchemaGraphBuilder, e2o_rank, o2o_rank};
use crate::cycles::has_cycle;
use crate::reach::{Inclusion, included};

/// The derived schema of one log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedSchema {
    /// Lead object type as given in the log.
    pub lead_raw: String,
    /// Normalized lead object type.
    pub lead: String,
    pub namespace: String,
    pub cycle_policy: CyclePolicy,
    /// Included event tables keyed by normalized event type.
    pub event_tables: BTreeMap<String, Table>,
    /// Included object tables keyed by normalized object type.
    pub object_tables: BTreeMap<String, Table>,
    /// Included event-to-object relations in visit order.
    pub e2o: Vec<MaterializedRelation>,
    /// Included object-to-object relations in visit order.
    pub o2o: Vec<MaterializedRelation>,
    /// Object-to-object candidates refused by the graph builder.
    pub rejected: Vec<RelationKey>,
    pub decisions: Vec<AdmissionDecision>,
    /// BLAKE3 hex digest of the included sets and table layouts.
    pub fingerprint: String,
}

impl DerivedSchema {
    /// Every included table: events, objects, then linking tables in visit
    /// order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> + '_ {
        self.event_tables
            .values()
            .chain(self.object_tables.values())
            .chain(self.relations().filter_map(MaterializedRelation::link_table))
    }

    /// Included relations, event-to-object first.
    pub fn relations(&self) -> impl Iterator<Item = &MaterializedRelation> + '_ {
        self.e2o.iter().chain(&self.o2o)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> + '_ {
        self.relations().flat_map(|r| r.foreign_keys.iter())
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables().find(|t| t.name == name)
    }
}

/// Derive the schema of `log` around the lead object type `lead` (raw or
/// normalized).
///
/// Deterministic: the same log, lead and config give the same schema and
/// fingerprint.
///
/// # Errors
///
/// - [`DeriveError::InvalidParameter`] when `lead` is not an object type.
/// - [`DeriveError::EmptyResult`] when scoping or inclusion leaves nothing.
/// - [`DeriveError::NameCollision`] / [`DeriveError::EmptyIdentifier`] for
///   unusable labels.
/// - [`DeriveError::InvalidNamespace`] when the namespace is not a plain
///   identifier.
#[instrument(skip(log, config), fields(policy = %config.cycle_policy, scoped = config.scope_to_lead))]
pub fn derive(log: &EventLog, lead: &str, config: &DeriveConfig) -> Result<DerivedSchema, DeriveError> {
    config.validate_namespace()?;
    let max_len = config.max_identifier_len;

    let full_catalog = TypeCatalog::extract(log, max_len)?;
    let lead_entry = full_catalog.resolve_lead(lead)?.clone();

    let scoped;
    let log = if config.scope_to_lead {
        scoped = scope_to_lead(log, &lead_entry.raw)?;
        &scoped
    } else {
        log
    };
    let catalog = TypeCatalog::extract(log, max_len)?;
    let lead_name = lead_entry.name.as_str();

    // Tables and classified relations.
    let materializer = Materializer::new(config.namespace.as_str(), max_len);
    let mut event_tables = materializer.event_tables(log, &catalog)?;
    let mut object_tables = materializer.object_tables(log, &catalog)?;

    let materialize = |candidates: Vec<RelationCandidate>| -> Vec<MaterializedRelation> {
        candidates
            .iter()
            .map(|c| materializer.relation(c, classify(c, lead_name), lead_name))
            .collect()
    };
    let mut e2o = materialize(e2o_candidates(log, &catalog));
    let mut o2o = materialize(o2o_candidates(log, &catalog));
    e2o.sort_by_cached_key(|r| e2o_rank(&r.key, r.record_count));
    o2o.sort_by_cached_key(|r| o2o_rank(&r.key, r.record_count, lead_name));

    // Graph.
    let mut builder = SchemaGraphBuilder::seed(
        catalog.event_types().iter().map(|t| t.name.as_str()),
        catalog.object_types().iter().map(|t| t.name.as_str()),
    );
    for relation in &e2o {
        builder.admit_e2o(&relation.key, relation.record_count);
    }
    let mut graph = builder.into_undirected();
    if config.cycle_policy == CyclePolicy::Global && has_cycle(graph.graph()) {
        warn!("event-object relations already form a cycle; every o2o candidate will be rejected");
    }
    for relation in &o2o {
        graph.admit_o2o(&relation.key, relation.record_count, config.cycle_policy);
    }

    let inclusion = included(&graph, lead_name)?;

    // Assembly.
    event_tables.retain(|name, _| inclusion.event_types.contains(name));
    object_tables.retain(|name, _| inclusion.object_types.contains(name));
    e2o.retain(|r| inclusion.e2o.contains(&r.key));
    o2o.retain(|r| inclusion.o2o.contains(&r.key));

    let mut inlined: BTreeMap<(&str, &str), &RelationKey> = BTreeMap::new();
    for relation in e2o.iter().chain(&o2o) {
        let Some(inline) = relation.inline_column() else {
            continue;
        };
        let slot = (inline.owner_table.as_str(), inline.column.as_str());
        if let Some(first) = inlined.insert(slot, &relation.key) {
            return Err(DeriveError::NameCollision {
                scope: format!("columns of {}", inline.owner_table),
                identifier: inline.column.clone(),
                first: format!("foreign key of {first}"),
                second: format!("foreign key of {}", relation.key),
            });
        }
        let owner = event_tables
            .values_mut()
            .chain(object_tables.values_mut())
            .find(|t| t.name == inline.owner_table);
        if let Some(table) = owner {
            apply_inline(table, inline)?;
        }
    }

    let fingerprint = fingerprint(&inclusion, &event_tables, &object_tables, &e2o, &o2o);
    let schema = DerivedSchema {
        lead_raw: lead_entry.raw.clone(),
        lead: lead_entry.name.clone(),
        namespace: config.namespace.clone(),
        cycle_policy: config.cycle_policy,
        event_tables,
        object_tables,
        e2o,
        o2o,
        rejected: graph.rejected(),
        decisions: graph.decisions().to_vec(),
        fingerprint,
    };

    info!(
        lead = %schema.lead,
        tables = schema.tables().count(),
        foreign_keys = schema.foreign_keys().count(),
        rejected = schema.rejected.len(),
        fingerprint = %schema.fingerprint,
        "derived schema"
    );
    Ok(schema)
}

fn fingerprint(
    inclusion: &Inclusion,
    event_tables: &BTreeMap<String, Table>,
    object_tables: &BTreeMap<String, Table>,
    e2o: &[MaterializedRelation],
    o2o: &[MaterializedRelation],
) -> String {
    let mut hasher = blake3::Hasher::new();
    let mut field = |bytes: &[u8]| {
        hasher.update(bytes);
        hasher.update(b"\x00");
    };

    for name in inclusion.event_types.iter().chain(&inclusion.object_types) {
        field(name.as_bytes());
    }
    for relation in e2o.iter().chain(o2o) {
        field(relation.key.kind.as_str().as_bytes());
        field(relation.key.name().as_bytes());
        field(relation.cardinality.to_string().as_bytes());
    }
    let link_tables = e2o.iter().chain(o2o).filter_map(MaterializedRelation::link_table);
    for table in event_tables.values().chain(object_tables.values()).chain(link_tables) {
        field(table.name.as_bytes());
        for column in &table.columns {
            field(column.name.as_bytes());
            field(column.kind.as_str().as_bytes());
        }
    }

    hasher.finalize().to_hex().to_string()
}
