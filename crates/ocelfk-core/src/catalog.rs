//! Type catalog extraction.
//!
//! Enumerates the distinct event activities and object types of a log in
//! first-seen order and assigns each its normalized identifier. Collisions
//! between raw labels are rejected here, before any table is built.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::DeriveError;
use crate::log::EventLog;
use crate::normalize::IdentifierRegistry;

/// One distinct event or object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeEntry {
    /// Label as it appears in the log.
    pub raw: String,
    /// Normalized identifier.
    pub name: String,
    /// Number of events / objects carrying this type.
    pub count: usize,
}

/// Distinct event and object types of one log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeCatalog {
    event_types: Vec<TypeEntry>,
    object_types: Vec<TypeEntry>,
    #[serde(skip)]
    event_index: HashMap<String, usize>,
    #[serde(skip)]
    object_index: HashMap<String, usize>,
}

impl TypeCatalog {
    /// Extract the catalog of `log`.
    ///
    /// # Errors
    ///
    /// Returns [`DeriveError::NameCollision`] when two raw labels of the same
    /// kind normalize to one identifier, or [`DeriveError::EmptyIdentifier`]
    /// when a label normalizes to nothing.
    #[instrument(skip(log))]
    pub fn extract(log: &EventLog, max_identifier_len: usize) -> Result<Self, DeriveError> {
        let mut catalog = Self::default();

        let mut names = IdentifierRegistry::new("event types", max_identifier_len);
        for event in &log.events {
            bump(
                &mut catalog.event_types,
                &mut catalog.event_index,
                &mut names,
                &event.activity,
            )?;
        }

        let mut names = IdentifierRegistry::new("object types", max_identifier_len);
        for object in &log.objects {
            bump(
                &mut catalog.object_types,
                &mut catalog.object_index,
                &mut names,
                &object.object_type,
            )?;
        }

        debug!(
            event_types = catalog.event_types.len(),
            object_types = catalog.object_types.len(),
            "extracted type catalog"
        );
        Ok(catalog)
    }

    #[must_use]
    pub fn event_types(&self) -> &[TypeEntry] {
        &self.event_types
    }

    #[must_use]
    pub fn object_types(&self) -> &[TypeEntry] {
        &self.object_types
    }

    /// Normalized name of a raw event activity.
    #[must_use]
    pub fn event_type_name(&self, raw: &str) -> Option<&str> {
        self.event_index
            .get(raw)
            .map(|&i| self.event_types[i].name.as_str())
    }

    /// Normalized name of a raw object type.
    #[must_use]
    pub fn object_type_name(&self, raw: &str) -> Option<&str> {
        self.object_index
            .get(raw)
            .map(|&i| self.object_types[i].name.as_str())
    }

    /// Resolve the lead object type, given either its raw label or its
    /// normalized identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DeriveError::InvalidParameter`] listing the raw object types
    /// when `lead` matches none of them.
    pub fn resolve_lead(&self, lead: &str) -> Result<&TypeEntry, DeriveError> {
        self.object_index
            .get(lead)
            .map(|&i| &self.object_types[i])
            .or_else(|| self.object_types.iter().find(|t| t.name == lead))
            .ok_or_else(|| DeriveError::InvalidParameter {
                lead: lead.to_string(),
                available: self.object_types.iter().map(|t| t.raw.clone()).collect(),
            })
    }
}

fn bump(
    entries: &mut Vec<TypeEntry>,
    index: &mut HashMap<String, usize>,
    names: &mut IdentifierRegistry,
    raw: &str,
) -> Result<(), DeriveError> {
    if let Some(&i) = index.get(raw) {
        entries[i].count += 1;
        return Ok(());
    }
    let name = names.register(raw)?;
    index.insert(raw.to_string(), entries.len());
    entries.push(TypeEntry {
        raw: raw.to_string(),
        name,
        count: 1,
    });
    Ok(())
}
