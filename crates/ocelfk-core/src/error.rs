use std::fmt;

/// Errors that abort a schema derivation run.
///
/// Every variant is fatal for the run: no partial schema is produced and
/// nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeriveError {
    /// The requested lead object type is not an object type of the log.
    #[error(
        "lead object type `{lead}` is not an object type of this log (available: {})",
        .available.join(", ")
    )]
    InvalidParameter {
        lead: String,
        available: Vec<String>,
    },

    /// Scoping or inclusion filtering left nothing to derive.
    #[error("no {what} left after {stage} around lead object type `{lead}`")]
    EmptyResult {
        stage: &'static str,
        what: &'static str,
        lead: String,
    },

    /// Two distinct raw labels normalize to the same identifier.
    #[error("{scope}: `{first}` and `{second}` both normalize to `{identifier}`")]
    NameCollision {
        scope: String,
        identifier: String,
        first: String,
        second: String,
    },

    /// A raw label has no characters left after normalization.
    #[error("{scope}: `{label}` normalizes to an empty identifier")]
    EmptyIdentifier { scope: String, label: String },

    /// The table namespace is empty or holds characters other than ASCII
    /// letters, digits and `_`.
    #[error("namespace `{namespace}` must be non-empty ASCII letters, digits or `_`")]
    InvalidNamespace { namespace: String },
}

impl DeriveError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidParameter { .. } => ErrorCode::InvalidLeadType,
            Self::EmptyResult { .. } => ErrorCode::EmptyResult,
            Self::NameCollision { .. } => ErrorCode::NameCollision,
            Self::EmptyIdentifier { .. } => ErrorCode::EmptyIdentifier,
            Self::InvalidNamespace { .. } => ErrorCode::InvalidNamespace,
        }
    }
}

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    LogParseError,
    InvalidLeadType,
    MissingLeadType,
    EmptyResult,
    InvalidNamespace,
    NameCollision,
    EmptyIdentifier,
    ExportFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::LogParseError => "E1002",
            Self::InvalidLeadType => "E2001",
            Self::MissingLeadType => "E2002",
            Self::EmptyResult => "E2003",
            Self::InvalidNamespace => "E2004",
            Self::NameCollision => "E3001",
            Self::EmptyIdentifier => "E3002",
            Self::ExportFailed => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::LogParseError => "Event log parse error",
            Self::InvalidLeadType => "Unknown lead object type",
            Self::MissingLeadType => "Lead object type not given",
            Self::EmptyResult => "Nothing left to derive",
            Self::InvalidNamespace => "Namespace is not a plain identifier",
            Self::NameCollision => "Identifier collision after normalization",
            Self::EmptyIdentifier => "Label normalizes to an empty identifier",
            Self::ExportFailed => "Schema export failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in ocelfk.toml and retry."),
            Self::LogParseError => {
                Some("The log must be JSON with `events`, `objects` and `relations` arrays.")
            }
            Self::InvalidLeadType => Some("Run `ocelfk types <log>` to list the object types."),
            Self::MissingLeadType => {
                Some("Pass `--lead <type>` or set `derive.lead_object_type` in ocelfk.toml.")
            }
            Self::EmptyResult => Some("Pick a lead object type that events actually relate to."),
            Self::InvalidNamespace => Some("Use letters, digits and `_` only, e.g. `--namespace sales`."),
            Self::NameCollision | Self::EmptyIdentifier => {
                Some("Rename the offending types or attributes in the source log.")
            }
            Self::ExportFailed => Some("Check disk space and write permissions."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::{DeriveError, ErrorCode};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::LogParseError,
            ErrorCode::InvalidLeadType,
            ErrorCode::MissingLeadType,
            ErrorCode::EmptyResult,
            ErrorCode::InvalidNamespace,
            ErrorCode::NameCollision,
            ErrorCode::EmptyIdentifier,
            ErrorCode::ExportFailed,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::NameCollision.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn invalid_parameter_lists_available_types() {
        let err = DeriveError::InvalidParameter {
            lead: "invoice".to_string(),
            available: vec!["orders".to_string(), "items".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("`invoice`"));
        assert!(msg.contains("orders, items"));
        assert_eq!(err.code(), ErrorCode::InvalidLeadType);
    }
}
