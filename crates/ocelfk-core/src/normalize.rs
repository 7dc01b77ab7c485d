//! Raw label → schema-safe identifier.
//!
//! [`normalize_identifier`] is pure: it never looks at other labels, so two
//! distinct labels may land on the same identifier. [`IdentifierRegistry`]
//! sits on top of it and turns such collisions into
//! [`DeriveError::NameCollision`].

use std::collections::{BTreeMap, BTreeSet};

use crate::error::DeriveError;

/// Default maximum identifier length.
pub const DEFAULT_MAX_IDENTIFIER_LEN: usize = 100;

/// Normalize a raw type or column label.
///
/// Characters outside `[0-9a-zA-Z ]` are dropped, the rest is split on
/// whitespace, every word is capitalized (first letter upper, remaining
/// letters lower) and the words are concatenated. The result is cut to
/// `max_len` characters.
///
/// ```
/// use ocelfk_core::normalize::normalize_identifier;
///
/// assert_eq!(normalize_identifier("create order", 100), "CreateOrder");
/// assert_eq!(normalize_identifier("pay-ment (EUR)", 100), "PaymentEur");
/// ```
#[must_use]
pub fn normalize_identifier(raw: &str, max_len: usize) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect();

    let mut out = String::with_capacity(cleaned.len());
    for word in cleaned.split_whitespace() {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars.map(|c| c.to_ascii_lowercase()));
        }
    }

    // Only ASCII survives the filter, so byte truncation is char-safe.
    out.truncate(max_len);
    out
}

/// Tracks which raw label claimed each identifier within one scope (the
/// event types of a log, the columns of one table, ...).
#[derive(Debug, Clone)]
pub struct IdentifierRegistry {
    scope: String,
    max_len: usize,
    claimed: BTreeMap<String, String>,
    pinned: BTreeSet<String>,
}

impl IdentifierRegistry {
    pub fn new(scope: impl Into<String>, max_len: usize) -> Self {
        Self {
            scope: scope.into(),
            max_len,
            claimed: BTreeMap::new(),
            pinned: BTreeSet::new(),
        }
    }

    /// Reserve an identifier verbatim, bypassing normalization.
    ///
    /// Used for canonical columns such as `ID` and `Time`.
    ///
    /// # Errors
    ///
    /// Returns [`DeriveError::NameCollision`] if the identifier is taken.
    pub fn pin(&mut self, identifier: &str) -> Result<(), DeriveError> {
        self.claim(identifier.to_string(), identifier)?;
        self.pinned.insert(identifier.to_string());
        Ok(())
    }

    /// Normalize `raw` and claim the result.
    ///
    /// Registering the same raw label twice is a no-op and returns the same
    /// identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DeriveError::EmptyIdentifier`] if nothing survives
    /// normalization, or [`DeriveError::NameCollision`] if a different raw
    /// label already owns the identifier.
    pub fn register(&mut self, raw: &str) -> Result<String, DeriveError> {
        let identifier = normalize_identifier(raw, self.max_len);
        if identifier.is_empty() {
            return Err(DeriveError::EmptyIdentifier {
                scope: self.scope.clone(),
                label: raw.to_string(),
            });
        }
        self.claim(identifier.clone(), raw)?;
        Ok(identifier)
    }

    /// Identifier previously claimed by `raw`, if any.
    #[must_use]
    pub fn get(&self, raw: &str) -> Option<&str> {
        self.claimed
            .iter()
            .find(|(_, owner)| owner.as_str() == raw)
            .map(|(identifier, _)| identifier.as_str())
    }

    fn claim(&mut self, identifier: String, raw: &str) -> Result<(), DeriveError> {
        match self.claimed.get(&identifier) {
            Some(owner) if owner == raw && !self.pinned.contains(&identifier) => Ok(()),
            Some(owner) => Err(DeriveError::NameCollision {
                scope: self.scope.clone(),
                identifier,
                first: owner.clone(),
                second: raw.to_string(),
            }),
            None => {
                self.claimed.insert(identifier, raw.to_string());
                Ok(())
            }
        }
    }
}
