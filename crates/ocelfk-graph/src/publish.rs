//! Hand a derived schema to an upload target.
//!
//! The target is anything implementing [`SchemaSink`]. [`publish`] creates
//! every table first and only then declares foreign keys, resolving table
//! names through the returned [`TableCatalog`].

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use ocelfk_core::table::{ForeignKey, Table};
use tracing::{debug, info, instrument};

use crate::derive::DerivedSchema;

/// Receiver of tables and foreign keys.
pub trait SchemaSink {
    /// Handle the sink assigns to a created table.
    type TableId: Clone;

    /// Create one table with its rows.
    ///
    /// # Errors
    ///
    /// Sink-specific.
    fn create_table(&mut self, table: &Table) -> Result<Self::TableId>;

    /// Declare `fk` between two previously created tables.
    ///
    /// # Errors
    ///
    /// Sink-specific.
    fn create_foreign_key(
        &mut self,
        parent: &Self::TableId,
        child: &Self::TableId,
        fk: &ForeignKey,
    ) -> Result<()>;
}

/// Table name → sink handle, for one publish run.
#[derive(Debug, Clone)]
pub struct TableCatalog<Id> {
    ids: BTreeMap<String, Id>,
}

impl<Id> Default for TableCatalog<Id> {
    fn default() -> Self {
        Self {
            ids: BTreeMap::new(),
        }
    }
}

impl<Id> TableCatalog<Id> {
    pub fn insert(&mut self, name: impl Into<String>, id: Id) {
        self.ids.insert(name.into(), id);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Id> {
        self.ids.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ids.keys().map(String::as_str)
    }
}

/// Create every table of `schema` in `sink`, then every foreign key.
///
/// # Errors
///
/// Fails on the first sink error, or when a foreign key names a table that
/// was not created.
#[instrument(skip_all, fields(lead = %schema.lead))]
pub fn publish<S: SchemaSink>(schema: &DerivedSchema, sink: &mut S) -> Result<TableCatalog<S::TableId>> {
    let mut catalog = TableCatalog::default();

    for table in schema.tables() {
        let id = sink
            .create_table(table)
            .with_context(|| format!("create table {}", table.name))?;
        debug!(table = %table.name, rows = table.row_count(), "created table");
        catalog.insert(table.name.clone(), id);
    }

    let mut foreign_keys = 0usize;
    for fk in schema.foreign_keys() {
        let Some(parent) = catalog.get(&fk.parent_table) else {
            bail!("foreign key {fk} references unknown table {}", fk.parent_table);
        };
        let Some(child) = catalog.get(&fk.child_table) else {
            bail!("foreign key {fk} references unknown table {}", fk.child_table);
        };
        sink.create_foreign_key(parent, child, fk)
            .with_context(|| format!("create foreign key {fk}"))?;
        foreign_keys += 1;
    }

    info!(tables = catalog.len(), foreign_keys, "published schema");
    Ok(catalog)
}
