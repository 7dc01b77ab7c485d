//! In-memory object-centric event log.
//!
//! The log is the input contract of a derivation run: events, objects,
//! event-to-object relations, and optionally object-to-object relations.
//! Records are immutable once loaded; scoping produces a new log.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::table::Value;

/// One event occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub activity: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

/// One object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

/// An event-to-object relation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub event_id: String,
    pub object_id: String,
    pub activity: String,
    pub object_type: String,
    #[serde(default)]
    pub qualifier: Option<String>,
}

/// An object-to-object relation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRelationRecord {
    pub source_id: String,
    pub source_type: String,
    pub target_id: String,
    pub target_type: String,
    #[serde(default)]
    pub qualifier: Option<String>,
}

/// The whole log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    pub events: Vec<EventRecord>,
    pub objects: Vec<ObjectRecord>,
    pub relations: Vec<RelationRecord>,
    #[serde(default)]
    pub object_relations: Vec<ObjectRelationRecord>,
}

impl EventLog {
    /// Parse a log from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the document does not match the
    /// expected shape.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Record counts as `(events, objects, relations, object_relations)`.
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.events.len(),
            self.objects.len(),
            self.relations.len(),
            self.object_relations.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_relations_are_optional() {
        let log = EventLog::from_json_str(
            r#"{
                "events": [{"id": "e1", "activity": "Create Order", "timestamp": "2024-03-01T10:00:00Z"}],
                "objects": [{"id": "o1", "type": "orders", "attributes": {"price": 12.5}}],
                "relations": [{"event_id": "e1", "object_id": "o1", "activity": "Create Order", "object_type": "orders"}]
            }"#,
        )
        .expect("parse log");

        assert_eq!(log.counts(), (1, 1, 1, 0));
        assert!(log.events[0].attributes.is_empty());
        assert_eq!(log.objects[0].attributes["price"], Value::Float(12.5));
        assert_eq!(log.relations[0].qualifier, None);
    }

    #[test]
    fn missing_timestamp_is_rejected() {
        let err = EventLog::from_json_str(
            r#"{"events": [{"id": "e1", "activity": "A"}], "objects": [], "relations": []}"#,
        );
        assert!(err.is_err());
    }
}
