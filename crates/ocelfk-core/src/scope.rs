//! Narrow a log around its lead object type.
//!
//! Only activities that relate to at least one object of the lead type are
//! kept. Removing events cascades: relations of dropped events go, objects
//! no surviving relation references go, and object relations lose any
//! record with a dropped endpoint.

use std::collections::HashSet;

use tracing::{info, instrument};

use crate::error::DeriveError;
use crate::log::EventLog;

/// Scope `log` to the activities touching `lead` (a raw object type label).
///
/// # Errors
///
/// Returns [`DeriveError::EmptyResult`] when no events, objects or relations
/// survive.
#[instrument(skip(log))]
pub fn scope_to_lead(log: &EventLog, lead: &str) -> Result<EventLog, DeriveError> {
    let activities: HashSet<&str> = log
        .relations
        .iter()
        .filter(|r| r.object_type == lead)
        .map(|r| r.activity.as_str())
        .collect();

    let events: Vec<_> = log
        .events
        .iter()
        .filter(|e| activities.contains(e.activity.as_str()))
        .cloned()
        .collect();
    let event_ids: HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();

    let relations: Vec<_> = log
        .relations
        .iter()
        .filter(|r| event_ids.contains(r.event_id.as_str()))
        .cloned()
        .collect();
    let object_ids: HashSet<&str> = relations.iter().map(|r| r.object_id.as_str()).collect();

    let objects: Vec<_> = log
        .objects
        .iter()
        .filter(|o| object_ids.contains(o.id.as_str()))
        .cloned()
        .collect();
    let kept_objects: HashSet<&str> = objects.iter().map(|o| o.id.as_str()).collect();

    let object_relations: Vec<_> = log
        .object_relations
        .iter()
        .filter(|r| {
            kept_objects.contains(r.source_id.as_str()) && kept_objects.contains(r.target_id.as_str())
        })
        .cloned()
        .collect();

    let empty = |what: &'static str| DeriveError::EmptyResult {
        stage: "lead-type scoping",
        what,
        lead: lead.to_string(),
    };
    if events.is_empty() {
        return Err(empty("events"));
    }
    if objects.is_empty() {
        return Err(empty("objects"));
    }
    if relations.is_empty() {
        return Err(empty("event-object relations"));
    }

    info!(
        activities = activities.len(),
        events = events.len(),
        objects = objects.len(),
        relations = relations.len(),
        object_relations = object_relations.len(),
        "scoped log to lead object type"
    );

    Ok(EventLog {
        events,
        objects,
        relations,
        object_relations,
    })
}
