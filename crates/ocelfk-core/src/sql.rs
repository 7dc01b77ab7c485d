//! Literal SQL rendering of a [`Table`].
//!
//! The upload target pulls each table through a plain `SELECT`; small
//! tables can also be shipped inline as a `UNION ALL` of literal rows.

use std::fmt::Write as _;

use crate::table::{Table, Value};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Double-quoted identifier with embedded quotes doubled.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// One cell as a SQL literal.
#[must_use]
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Float(_) => "NULL".to_string(),
        Value::Timestamp(ts) => format!("TIMESTAMP '{}'", ts.at().format(TIMESTAMP_FORMAT)),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

/// `SELECT "c1", "c2" FROM "table";`
#[must_use]
pub fn select_statement(table: &Table) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| quote_identifier(&c.name))
        .collect();
    format!(
        "SELECT {} FROM {};",
        columns.join(", "),
        quote_identifier(&table.name)
    )
}

/// Every row as a literal `SELECT`, joined with `UNION ALL`.
///
/// A table without rows still yields a statement carrying its column list.
#[must_use]
pub fn literal_select(table: &Table) -> String {
    if table.rows.is_empty() {
        let nulls: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("NULL AS {}", quote_identifier(&c.name)))
            .collect();
        return format!("SELECT {} FROM (SELECT 1) AS dummy WHERE 1=0", nulls.join(", "));
    }

    let mut out = String::new();
    for (i, row) in table.rows.iter().enumerate() {
        if i > 0 {
            out.push_str("\nUNION ALL\n");
        }
        out.push_str("SELECT ");
        for (j, (column, value)) in table.columns.iter().zip(row).enumerate() {
            if j > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{} AS {}", literal(value), quote_identifier(&column.name));
        }
        out.push_str(" FROM (SELECT 1) AS dummy WHERE 1=1");
    }
    out
}
