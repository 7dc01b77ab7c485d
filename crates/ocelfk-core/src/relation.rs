//! Relation candidates: relation records grouped by their pair of types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::catalog::TypeCatalog;
use crate::log::EventLog;

/// Event-to-object or object-to-object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    E2O,
    O2O,
}

impl RelationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::E2O => "e2o",
            Self::O2O => "o2o",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a relation candidate.
///
/// `source` / `target` are normalized type names. For event-to-object
/// relations the source is the event type and the target the object type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationKey {
    pub kind: RelationKind,
    pub source: String,
    pub target: String,
}

impl RelationKey {
    pub fn e2o(event_type: impl Into<String>, object_type: impl Into<String>) -> Self {
        Self {
            kind: RelationKind::E2O,
            source: event_type.into(),
            target: object_type.into(),
        }
    }

    pub fn o2o(source_type: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            kind: RelationKind::O2O,
            source: source_type.into(),
            target: target_type.into(),
        }
    }

    /// Candidate name, `source_target`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}_{}", self.source, self.target)
    }
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.source, self.target)
    }
}

/// One relation record reduced to its two endpoint ids.
///
/// For event-to-object relations `source_id` is the event id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub source_id: String,
    pub target_id: String,
    pub qualifier: Option<String>,
}

/// All records of one `(source type, target type)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationCandidate {
    pub key: RelationKey,
    pub links: Vec<Link>,
}

impl RelationCandidate {
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.links.len()
    }
}

/// Group event-to-object relation records by `(event type, object type)`.
///
/// Records whose activity or object type is missing from `catalog` are
/// skipped. Candidates come back sorted by key.
#[instrument(skip_all)]
pub fn e2o_candidates(log: &EventLog, catalog: &TypeCatalog) -> Vec<RelationCandidate> {
    let mut groups: BTreeMap<RelationKey, Vec<Link>> = BTreeMap::new();
    let mut skipped = 0usize;

    for record in &log.relations {
        let (Some(event_type), Some(object_type)) = (
            catalog.event_type_name(&record.activity),
            catalog.object_type_name(&record.object_type),
        ) else {
            skipped += 1;
            continue;
        };
        groups
            .entry(RelationKey::e2o(event_type, object_type))
            .or_default()
            .push(Link {
                source_id: record.event_id.clone(),
                target_id: record.object_id.clone(),
                qualifier: record.qualifier.clone(),
            });
    }

    if skipped > 0 {
        debug!(skipped, "skipped event-object records with uncatalogued types");
    }
    into_candidates(groups)
}

/// Group object-to-object relation records by `(source type, target type)`.
#[instrument(skip_all)]
pub fn o2o_candidates(log: &EventLog, catalog: &TypeCatalog) -> Vec<RelationCandidate> {
    let mut groups: BTreeMap<RelationKey, Vec<Link>> = BTreeMap::new();
    let mut skipped = 0usize;

    for record in &log.object_relations {
        let (Some(source_type), Some(target_type)) = (
            catalog.object_type_name(&record.source_type),
            catalog.object_type_name(&record.target_type),
        ) else {
            skipped += 1;
            continue;
        };
        groups
            .entry(RelationKey::o2o(source_type, target_type))
            .or_default()
            .push(Link {
                source_id: record.source_id.clone(),
                target_id: record.target_id.clone(),
                qualifier: record.qualifier.clone(),
            });
    }

    if skipped > 0 {
        debug!(skipped, "skipped object-object records with uncatalogued types");
    }
    into_candidates(groups)
}

fn into_candidates(groups: BTreeMap<RelationKey, Vec<Link>>) -> Vec<RelationCandidate> {
    groups
        .into_iter()
        .map(|(key, links)| RelationCandidate { key, links })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_group_by_normalized_type_pair() {
        let log: EventLog = serde_json::from_value(json!({
            "events": [
                {"id": "e1", "activity": "place order", "timestamp": "2024-01-01T00:00:00Z"},
                {"id": "e2", "activity": "place order", "timestamp": "2024-01-02T00:00:00Z"}
            ],
            "objects": [
                {"id": "o1", "type": "orders"},
                {"id": "i1", "type": "items"}
            ],
            "relations": [
                {"event_id": "e1", "object_id": "o1", "activity": "place order", "object_type": "orders"},
                {"event_id": "e2", "object_id": "o1", "activity": "place order", "object_type": "orders"},
                {"event_id": "e1", "object_id": "i1", "activity": "place order", "object_type": "items", "qualifier": "contains"},
                {"event_id": "e9", "object_id": "i1", "activity": "ghost", "object_type": "items"}
            ],
            "object_relations": [
                {"source_id": "o1", "source_type": "orders", "target_id": "i1", "target_type": "items"}
            ]
        }))
        .expect("log");
        let catalog = TypeCatalog::extract(&log, 100).expect("catalog");

        let e2o = e2o_candidates(&log, &catalog);
        let keys: Vec<String> = e2o.iter().map(|c| c.key.name()).collect();
        assert_eq!(keys, vec!["PlaceOrder_Items", "PlaceOrder_Orders"]);
        assert_eq!(e2o[1].record_count(), 2);
        assert_eq!(e2o[0].links[0].qualifier.as_deref(), Some("contains"));

        let o2o = o2o_candidates(&log, &catalog);
        assert_eq!(o2o.len(), 1);
        assert_eq!(o2o[0].key, RelationKey::o2o("Orders", "Items"));
    }

    #[test]
    fn key_display_matches_name() {
        let key = RelationKey::e2o("A", "Y");
        assert_eq!(key.to_string(), "A_Y");
        assert_eq!(key.name(), "A_Y");
        assert_eq!(key.kind.to_string(), "e2o");
    }
}
