//! Typed tables handed to the upload collaborator.
//!
//! A [`Table`] is an ordered column list plus positional rows. Each
//! [`Column`] carries a [`ColumnKind`] inferred from its non-null cells, so
//! downstream writers never have to guess how to render a cell.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An instant read from an RFC 3339 string, together with that string.
///
/// The source text is what the cell renders as once its column falls back
/// to text, so demotion never rewrites the log's data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Stamp {
    at: DateTime<Utc>,
    raw: String,
}

impl Stamp {
    /// Parse an RFC 3339 string, keeping it verbatim.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(raw).ok().map(|at| Self {
            at: at.with_timezone(&Utc),
            raw: raw.to_string(),
        })
    }

    #[must_use]
    pub const fn at(&self) -> &DateTime<Utc> {
        &self.at
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl From<DateTime<Utc>> for Stamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self {
            at,
            raw: at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }
}

impl Serialize for Stamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Stamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("`{raw}` is not an RFC 3339 timestamp")))
    }
}

/// A single typed cell.
///
/// JSON input maps onto the variants in declaration order: `null`, booleans,
/// integers, floats, RFC 3339 strings, and finally any other string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Timestamp(Stamp),
    Text(String),
}

impl Value {
    /// Convenience constructor for text cells.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// `true` for null cells and text cells holding only whitespace.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// The column kind this cell contributes, or `None` for null.
    #[must_use]
    pub const fn kind(&self) -> Option<ColumnKind> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(ColumnKind::Boolean),
            Self::Integer(_) => Some(ColumnKind::Integer),
            Self::Float(_) => Some(ColumnKind::Float),
            Self::Timestamp(_) => Some(ColumnKind::Timestamp),
            Self::Text(_) => Some(ColumnKind::Text),
        }
    }

    /// Borrow the text of a text cell.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert this cell so it fits a column of `kind`.
    ///
    /// Integers widen to floats; anything else that does not match is
    /// rendered to text. Null stays null.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coerce(self, kind: ColumnKind) -> Self {
        match (self, kind) {
            (Self::Null, _) => Self::Null,
            (Self::Integer(i), ColumnKind::Float) => Self::Float(i as f64),
            (v, k) if v.kind() == Some(k) => v,
            (v, _) => Self::Text(v.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Timestamp(ts) => f.write_str(ts.raw()),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(at: DateTime<Utc>) -> Self {
        Self::Timestamp(Stamp::from(at))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Option<String>> for Value {
    fn from(s: Option<String>) -> Self {
        s.map_or(Self::Null, Self::Text)
    }
}

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl ColumnKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
        }
    }

    /// Least upper bound of two kinds: equal kinds stay, integer and float
    /// widen to float, everything else falls back to text.
    #[must_use]
    pub const fn join(self, other: Self) -> Self {
        match (self, other) {
            (Self::Text, Self::Text) => Self::Text,
            (Self::Integer, Self::Integer) => Self::Integer,
            (Self::Float | Self::Integer, Self::Float | Self::Integer) => Self::Float,
            (Self::Boolean, Self::Boolean) => Self::Boolean,
            (Self::Timestamp, Self::Timestamp) => Self::Timestamp,
            _ => Self::Text,
        }
    }

    /// Infer the kind of a column from its cells. All-null columns are text.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        values
            .into_iter()
            .filter_map(Value::kind)
            .reduce(Self::join)
            .unwrap_or(Self::Text)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
}

/// A named table: ordered columns plus rows aligned with them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table from column-major data.
    ///
    /// Column kinds are inferred and every cell is coerced to its column's
    /// kind. All columns must have the same length; the row count is taken
    /// from the first column.
    #[must_use]
    pub fn from_columns(name: impl Into<String>, columns: Vec<(String, Vec<Value>)>) -> Self {
        let row_count = columns.first().map_or(0, |(_, values)| values.len());
        debug_assert!(columns.iter().all(|(_, v)| v.len() == row_count));

        let mut rows: Vec<Vec<Value>> = (0..row_count)
            .map(|_| Vec::with_capacity(columns.len()))
            .collect();
        let mut schema = Vec::with_capacity(columns.len());

        for (column_name, values) in columns {
            let kind = ColumnKind::infer(&values);
            let nullable = values.iter().any(|v| matches!(v, Value::Null));
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value.coerce(kind));
            }
            schema.push(Column {
                name: column_name,
                kind,
                nullable,
            });
        }

        Self {
            name: name.into(),
            columns: schema,
            rows,
        }
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Cells of one column, top to bottom.
    #[must_use]
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Remove a column and its cells, returning its description.
    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.column_index(name)?;
        for row in &mut self.rows {
            row.remove(idx);
        }
        Some(self.columns.remove(idx))
    }

    /// Append a column computed from each existing row.
    ///
    /// The caller is responsible for checking name uniqueness.
    pub fn append_column(&mut self, name: impl Into<String>, mut cell: impl FnMut(&[Value]) -> Value) {
        let values: Vec<Value> = self.rows.iter().map(|row| cell(row)).collect();
        let kind = ColumnKind::infer(&values);
        let nullable = values.iter().any(|v| matches!(v, Value::Null));
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value.coerce(kind));
        }
        self.columns.push(Column {
            name: name.into(),
            kind,
            nullable,
        });
    }
}

/// A foreign-key declaration: `(child_table, child_column)` references
/// `(parent_table, parent_column)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    pub child_table: String,
    pub child_column: String,
    pub parent_table: String,
    pub parent_column: String,
}

impl fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.child_table, self.child_column, self.parent_table, self.parent_column
        )
    }
}
