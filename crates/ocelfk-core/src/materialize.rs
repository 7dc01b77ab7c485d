//! Table materialization.
//!
//! Builds one attribute table per event type and per object type, and turns
//! every classified relation candidate into either an inlined foreign-key
//! column or a standalone linking table.
//!
//! # Naming
//!
//! ```text
//! e_<ns>_<EventType>              event table        ID, Time, attributes...
//! o_<ns>_<ObjectType>             object table       ID, attributes...
//! r_e_<ns>_<EventType>_<ObjType>  e2o linking table  EventID, ObjectID, Qualifier
//! r_o_<ns>_<Source>_<Target>      o2o linking table  SourceObjectID, TargetObjectID, Qualifier
//! ```
//!
//! Rows are never dropped. Attribute columns without a single non-empty
//! value for the type are.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::cardinality::{Cardinality, Owner, owner_of};
use crate::catalog::TypeCatalog;
use crate::error::DeriveError;
use crate::log::EventLog;
use crate::normalize::IdentifierRegistry;
use crate::relation::{RelationCandidate, RelationKey, RelationKind};
use crate::table::{ForeignKey, Table, Value};

pub const ID_COLUMN: &str = "ID";
pub const TIME_COLUMN: &str = "Time";
pub const EVENT_ID_COLUMN: &str = "EventID";
pub const OBJECT_ID_COLUMN: &str = "ObjectID";
pub const SOURCE_OBJECT_ID_COLUMN: &str = "SourceObjectID";
pub const TARGET_OBJECT_ID_COLUMN: &str = "TargetObjectID";
pub const QUALIFIER_COLUMN: &str = "Qualifier";

const PINNED_COLUMNS: [&str; 2] = [ID_COLUMN, TIME_COLUMN];

/// Table names for one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNaming {
    namespace: String,
}

impl TableNaming {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    #[must_use]
    pub fn event_table(&self, event_type: &str) -> String {
        format!("e_{}_{event_type}", self.namespace)
    }

    #[must_use]
    pub fn object_table(&self, object_type: &str) -> String {
        format!("o_{}_{object_type}", self.namespace)
    }

    #[must_use]
    pub fn relation_table(&self, key: &RelationKey) -> String {
        let prefix = match key.kind {
            RelationKind::E2O => "r_e",
            RelationKind::O2O => "r_o",
        };
        format!("{prefix}_{}_{}_{}", self.namespace, key.source, key.target)
    }

    /// Table of the relation's source endpoint type.
    #[must_use]
    pub fn source_table(&self, key: &RelationKey) -> String {
        match key.kind {
            RelationKind::E2O => self.event_table(&key.source),
            RelationKind::O2O => self.object_table(&key.source),
        }
    }

    /// Table of the relation's target endpoint type (always an object table).
    #[must_use]
    pub fn target_table(&self, key: &RelationKey) -> String {
        self.object_table(&key.target)
    }
}

/// A functional relation folded into its owner's table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineColumn {
    pub owner_table: String,
    pub column: String,
    pub parent_table: String,
    /// Owner id → partner id.
    pub values: BTreeMap<String, String>,
}

/// How a relation ends up in the schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "form", rename_all = "lowercase")]
pub enum Materialized {
    Inline(InlineColumn),
    Link(Table),
}

/// A classified and materialized relation candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterializedRelation {
    pub key: RelationKey,
    pub cardinality: Cardinality,
    pub record_count: usize,
    pub materialized: Materialized,
    pub foreign_keys: Vec<ForeignKey>,
}

impl MaterializedRelation {
    /// The linking table, for multi-valued relations.
    #[must_use]
    pub const fn link_table(&self) -> Option<&Table> {
        match &self.materialized {
            Materialized::Link(table) => Some(table),
            Materialized::Inline(_) => None,
        }
    }

    /// The inlined column, for functional relations.
    #[must_use]
    pub const fn inline_column(&self) -> Option<&InlineColumn> {
        match &self.materialized {
            Materialized::Inline(inline) => Some(inline),
            Materialized::Link(_) => None,
        }
    }
}

/// Builds tables for one derivation run.
#[derive(Debug, Clone)]
pub struct Materializer {
    naming: TableNaming,
    max_identifier_len: usize,
}

impl Materializer {
    pub fn new(namespace: impl Into<String>, max_identifier_len: usize) -> Self {
        Self {
            naming: TableNaming::new(namespace),
            max_identifier_len,
        }
    }

    #[must_use]
    pub const fn naming(&self) -> &TableNaming {
        &self.naming
    }

    /// One table per event type, keyed by normalized type name.
    ///
    /// # Errors
    ///
    /// Returns [`DeriveError::NameCollision`] or
    /// [`DeriveError::EmptyIdentifier`] for unusable attribute labels.
    #[instrument(skip_all)]
    pub fn event_tables(
        &self,
        log: &EventLog,
        catalog: &TypeCatalog,
    ) -> Result<BTreeMap<String, Table>, DeriveError> {
        let mut by_type: BTreeMap<&str, Vec<_>> = BTreeMap::new();
        for event in &log.events {
            if let Some(name) = catalog.event_type_name(&event.activity) {
                by_type.entry(name).or_default().push(event);
            }
        }

        let mut tables = BTreeMap::new();
        for (name, events) in by_type {
            let pinned = vec![
                (
                    ID_COLUMN.to_string(),
                    events.iter().map(|e| Value::text(&e.id)).collect(),
                ),
                (
                    TIME_COLUMN.to_string(),
                    events.iter().map(|e| Value::from(e.timestamp)).collect(),
                ),
            ];
            let attributes: Vec<_> = events.iter().map(|e| &e.attributes).collect();
            let table = self.attribute_table(self.naming.event_table(name), pinned, &attributes)?;
            debug!(table = %table.name, rows = table.row_count(), columns = table.columns.len(), "materialized event table");
            tables.insert(name.to_string(), table);
        }
        Ok(tables)
    }

    /// One table per object type, keyed by normalized type name.
    ///
    /// # Errors
    ///
    /// Same as [`Materializer::event_tables`].
    #[instrument(skip_all)]
    pub fn object_tables(
        &self,
        log: &EventLog,
        catalog: &TypeCatalog,
    ) -> Result<BTreeMap<String, Table>, DeriveError> {
        let mut by_type: BTreeMap<&str, Vec<_>> = BTreeMap::new();
        for object in &log.objects {
            if let Some(name) = catalog.object_type_name(&object.object_type) {
                by_type.entry(name).or_default().push(object);
            }
        }

        let mut tables = BTreeMap::new();
        for (name, objects) in by_type {
            let pinned = vec![(
                ID_COLUMN.to_string(),
                objects.iter().map(|o| Value::text(&o.id)).collect(),
            )];
            let attributes: Vec<_> = objects.iter().map(|o| &o.attributes).collect();
            let table = self.attribute_table(self.naming.object_table(name), pinned, &attributes)?;
            debug!(table = %table.name, rows = table.row_count(), columns = table.columns.len(), "materialized object table");
            tables.insert(name.to_string(), table);
        }
        Ok(tables)
    }

    /// Materialize one classified candidate.
    ///
    /// `lead` is the normalized lead object type; it decides which endpoint
    /// owns an object-to-object relation.
    #[must_use]
    pub fn relation(
        &self,
        candidate: &RelationCandidate,
        cardinality: Cardinality,
        lead: &str,
    ) -> MaterializedRelation {
        let key = &candidate.key;
        let (materialized, foreign_keys) = match cardinality {
            Cardinality::Functional => {
                let inline = self.inline_column(candidate, owner_of(key, lead));
                let fk = ForeignKey {
                    child_table: inline.owner_table.clone(),
                    child_column: inline.column.clone(),
                    parent_table: inline.parent_table.clone(),
                    parent_column: ID_COLUMN.to_string(),
                };
                (Materialized::Inline(inline), vec![fk])
            }
            Cardinality::Multi => {
                let table = self.link_table(candidate);
                let (source_column, target_column) = link_columns(key.kind);
                let fks = vec![
                    ForeignKey {
                        child_table: table.name.clone(),
                        child_column: source_column.to_string(),
                        parent_table: self.naming.source_table(key),
                        parent_column: ID_COLUMN.to_string(),
                    },
                    ForeignKey {
                        child_table: table.name.clone(),
                        child_column: target_column.to_string(),
                        parent_table: self.naming.target_table(key),
                        parent_column: ID_COLUMN.to_string(),
                    },
                ];
                (Materialized::Link(table), fks)
            }
        };

        MaterializedRelation {
            key: key.clone(),
            cardinality,
            record_count: candidate.record_count(),
            materialized,
            foreign_keys,
        }
    }

    fn inline_column(&self, candidate: &RelationCandidate, owner: Owner) -> InlineColumn {
        let key = &candidate.key;
        let (owner_table, parent_table, column) = match owner {
            Owner::Source => (
                self.naming.source_table(key),
                self.naming.target_table(key),
                key.target.clone(),
            ),
            Owner::Target => (
                self.naming.target_table(key),
                self.naming.source_table(key),
                key.source.clone(),
            ),
        };

        let mut values = BTreeMap::new();
        for link in &candidate.links {
            values
                .entry(owner.id(link).to_string())
                .or_insert_with(|| owner.partner_id(link).to_string());
        }

        InlineColumn {
            owner_table,
            column,
            parent_table,
            values,
        }
    }

    fn link_table(&self, candidate: &RelationCandidate) -> Table {
        let (source_column, target_column) = link_columns(candidate.key.kind);
        let links = &candidate.links;
        Table::from_columns(
            self.naming.relation_table(&candidate.key),
            vec![
                (
                    source_column.to_string(),
                    links.iter().map(|l| Value::text(&l.source_id)).collect(),
                ),
                (
                    target_column.to_string(),
                    links.iter().map(|l| Value::text(&l.target_id)).collect(),
                ),
                (
                    QUALIFIER_COLUMN.to_string(),
                    links.iter().map(|l| Value::from(l.qualifier.clone())).collect(),
                ),
            ],
        )
    }

    fn attribute_table(
        &self,
        table_name: String,
        mut columns: Vec<(String, Vec<Value>)>,
        attributes: &[&BTreeMap<String, Value>],
    ) -> Result<Table, DeriveError> {
        let mut names =
            IdentifierRegistry::new(format!("columns of {table_name}"), self.max_identifier_len);
        for (pinned, _) in &columns {
            names.pin(pinned)?;
        }

        let keys: BTreeSet<&str> = attributes
            .iter()
            .flat_map(|attrs| attrs.keys().map(String::as_str))
            .collect();

        for key in keys {
            let values: Vec<Value> = attributes
                .iter()
                .map(|attrs| attrs.get(key).cloned().unwrap_or(Value::Null))
                .collect();
            if values.iter().all(Value::is_empty) {
                continue;
            }
            columns.push((names.register(key)?, values));
        }

        Ok(Table::from_columns(table_name, columns))
    }
}

const fn link_columns(kind: RelationKind) -> (&'static str, &'static str) {
    match kind {
        RelationKind::E2O => (EVENT_ID_COLUMN, OBJECT_ID_COLUMN),
        RelationKind::O2O => (SOURCE_OBJECT_ID_COLUMN, TARGET_OBJECT_ID_COLUMN),
    }
}

/// Append an inlined foreign-key column to its owner's table, in place.
///
/// Rows whose id has no partner get a null cell. An attribute column of the
/// same name is replaced by the foreign key.
///
/// # Errors
///
/// Returns [`DeriveError::NameCollision`] when the name is taken by the
/// pinned `ID` or `Time` column.
pub fn apply_inline(table: &mut Table, inline: &InlineColumn) -> Result<(), DeriveError> {
    if PINNED_COLUMNS.contains(&inline.column.as_str()) {
        return Err(DeriveError::NameCollision {
            scope: format!("columns of {}", table.name),
            identifier: inline.column.clone(),
            first: inline.column.clone(),
            second: format!("foreign key to {}", inline.parent_table),
        });
    }

    if table.remove_column(&inline.column).is_some() {
        warn!(
            table = %table.name,
            column = %inline.column,
            parent = %inline.parent_table,
            "attribute column replaced by foreign key"
        );
    }

    // The id column comes first in every attribute table.
    table.append_column(inline.column.clone(), |row| {
        row.first()
            .and_then(Value::as_text)
            .and_then(|id| inline.values.get(id))
            .map_or(Value::Null, |partner| Value::text(partner.as_str()))
    });
    Ok(())
}
