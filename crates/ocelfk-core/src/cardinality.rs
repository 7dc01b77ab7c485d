//! Cardinality classification of relation candidates.
//!
//! A candidate is FUNCTIONAL when every owning endpoint relates to exactly
//! one distinct partner, and MULTI otherwise. Functional relations inline
//! as a foreign-key column on the owner's table; multi-valued ones need a
//! linking table.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::relation::{Link, RelationCandidate, RelationKey, RelationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    Functional,
    Multi,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Functional => "functional",
            Self::Multi => "multi",
        })
    }
}

/// Which endpoint of a relation owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Source,
    Target,
}

impl Owner {
    /// Owner id of a link.
    #[must_use]
    pub fn id(self, link: &Link) -> &str {
        match self {
            Self::Source => &link.source_id,
            Self::Target => &link.target_id,
        }
    }

    /// Partner id of a link.
    #[must_use]
    pub fn partner_id(self, link: &Link) -> &str {
        match self {
            Self::Source => &link.target_id,
            Self::Target => &link.source_id,
        }
    }
}

/// Owning side of a relation.
///
/// Events always own their event-to-object relations. An object-to-object
/// relation is owned by its child endpoint: the source, unless the source
/// is the lead type and the target is not.
#[must_use]
pub fn owner_of(key: &RelationKey, lead: &str) -> Owner {
    if key.kind == RelationKind::O2O && key.source == lead && key.target != lead {
        Owner::Target
    } else {
        Owner::Source
    }
}

/// Classify one candidate. `lead` is the normalized lead object type.
///
/// An empty candidate is vacuously functional.
#[must_use]
pub fn classify(candidate: &RelationCandidate, lead: &str) -> Cardinality {
    let owner = owner_of(&candidate.key, lead);

    let mut partners: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for link in &candidate.links {
        partners
            .entry(owner.id(link))
            .or_default()
            .insert(owner.partner_id(link));
    }

    if partners.values().all(|p| p.len() == 1) {
        Cardinality::Functional
    } else {
        Cardinality::Multi
    }
}
