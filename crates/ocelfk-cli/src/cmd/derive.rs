//! `ocelfk derive`: derive and print the foreign-key schema of a log.

use std::io::Write;

use clap::Args;
use ocelfk_core::config::DeriveConfig;
use ocelfk_core::materialize::Materialized;
use ocelfk_core::table::Table;
use ocelfk_graph::{Admission, DerivedSchema};
use serde::Serialize;

use crate::cmd::{DeriveOptions, derive_schema};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `ocelfk derive`.
#[derive(Args, Debug, Default)]
pub struct DeriveArgs {
    #[command(flatten)]
    pub options: DeriveOptions,
}

#[derive(Debug, Serialize)]
pub(crate) struct TableSummary {
    pub name: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

impl From<&Table> for TableSummary {
    fn from(table: &Table) -> Self {
        Self {
            name: table.name.clone(),
            rows: table.row_count(),
            columns: table
                .columns
                .iter()
                .map(|c| format!("{} {}", c.name, c.kind))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RelationSummary {
    kind: String,
    name: String,
    cardinality: String,
    records: usize,
    /// Owner table for inlined relations, linking table otherwise.
    table: String,
    form: &'static str,
}

#[derive(Debug, Serialize)]
struct RejectedSummary {
    name: String,
    reason: String,
}

#[derive(Debug, Serialize)]
struct DeriveReport {
    lead: String,
    cycle_policy: String,
    fingerprint: String,
    tables: Vec<TableSummary>,
    relations: Vec<RelationSummary>,
    foreign_keys: Vec<String>,
    rejected: Vec<RejectedSummary>,
}

impl DeriveReport {
    fn from_schema(schema: &DerivedSchema) -> Self {
        let relations = schema
            .relations()
            .map(|r| {
                let (form, table) = match &r.materialized {
                    Materialized::Inline(inline) => ("inline", inline.owner_table.clone()),
                    Materialized::Link(link) => ("link", link.name.clone()),
                };
                RelationSummary {
                    kind: r.key.kind.to_string(),
                    name: r.key.name(),
                    cardinality: r.cardinality.to_string(),
                    records: r.record_count,
                    table,
                    form,
                }
            })
            .collect();

        let rejected = schema
            .decisions
            .iter()
            .filter_map(|d| match &d.admission {
                Admission::Rejected { witness } => Some(RejectedSummary {
                    name: d.key.name(),
                    reason: witness.to_string(),
                }),
                Admission::Accepted => None,
            })
            .collect();

        Self {
            lead: schema.lead.clone(),
            cycle_policy: schema.cycle_policy.to_string(),
            fingerprint: schema.fingerprint.clone(),
            tables: schema.tables().map(TableSummary::from).collect(),
            relations,
            foreign_keys: schema.foreign_keys().map(ToString::to_string).collect(),
            rejected,
        }
    }
}

/// Execute `ocelfk derive`.
pub fn run_derive(args: &DeriveArgs, project: DeriveConfig, output: OutputMode) -> anyhow::Result<()> {
    let schema = derive_schema(&args.options, project, output)?;
    let report = DeriveReport::from_schema(&schema);
    render_mode(output, &report, render_text, render_pretty)
}

fn render_text(report: &DeriveReport, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "lead {} fingerprint {}", report.lead, report.fingerprint)?;
    for table in &report.tables {
        writeln!(w, "table {} {} {}", table.name, table.rows, table.columns.join(","))?;
    }
    for relation in &report.relations {
        writeln!(
            w,
            "relation {} {} {} {} {}",
            relation.kind, relation.name, relation.cardinality, relation.form, relation.table
        )?;
    }
    for fk in &report.foreign_keys {
        writeln!(w, "fk {fk}")?;
    }
    for rejected in &report.rejected {
        writeln!(w, "rejected {} {}", rejected.name, rejected.reason)?;
    }
    Ok(())
}

fn render_pretty(report: &DeriveReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_kv(w, "lead", &report.lead)?;
    pretty_kv(w, "policy", &report.cycle_policy)?;
    pretty_kv(w, "fingerprint", &report.fingerprint)?;

    writeln!(w)?;
    pretty_section(w, &format!("Tables ({})", report.tables.len()))?;
    for table in &report.tables {
        writeln!(w, "{} ({} rows)", table.name, table.rows)?;
        for column in &table.columns {
            writeln!(w, "    {column}")?;
        }
    }

    writeln!(w)?;
    pretty_section(w, &format!("Relations ({})", report.relations.len()))?;
    for relation in &report.relations {
        writeln!(
            w,
            "{:<4} {:<32} {:<10} {:>6}  {} → {}",
            relation.kind, relation.name, relation.cardinality, relation.records, relation.form, relation.table
        )?;
    }

    writeln!(w)?;
    pretty_section(w, &format!("Foreign keys ({})", report.foreign_keys.len()))?;
    for fk in &report.foreign_keys {
        writeln!(w, "{fk}")?;
    }

    if !report.rejected.is_empty() {
        writeln!(w)?;
        pretty_section(w, &format!("Rejected ({})", report.rejected.len()))?;
        for rejected in &report.rejected {
            writeln!(w, "{}: {}", rejected.name, rejected.reason)?;
        }
    }
    Ok(())
}
