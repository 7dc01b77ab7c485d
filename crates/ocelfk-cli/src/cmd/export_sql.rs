//! `ocelfk export-sql`: write the derived schema as literal SQL files.
//!
//! The output directory receives one `<table>.sql` per table, holding the
//! rows as a `UNION ALL` of literal selects, and a `schema.json` manifest
//! with column types, pull statements and foreign keys.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::Args;
use ocelfk_core::config::DeriveConfig;
use ocelfk_core::error::ErrorCode;
use ocelfk_core::sql::{literal_select, select_statement};
use ocelfk_core::table::{Column, ForeignKey, Table};
use ocelfk_graph::{SchemaSink, publish};
use serde::Serialize;
use tracing::{debug, info};

use crate::cmd::{DeriveOptions, derive_schema};
use crate::output::{CliError, OutputMode, pretty_kv, render_error, render_mode};

/// Name of the manifest written next to the table files.
pub const MANIFEST_FILE: &str = "schema.json";

#[derive(Args, Debug, Default)]
pub struct ExportSqlArgs {
    #[command(flatten)]
    pub options: DeriveOptions,

    /// Directory receiving the `.sql` files and `schema.json`.
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,
}

#[derive(Debug, Serialize)]
struct ManifestTable {
    name: String,
    file: String,
    rows: usize,
    columns: Vec<Column>,
    pull: String,
}

#[derive(Debug, Serialize)]
struct Manifest {
    lead: String,
    namespace: String,
    fingerprint: String,
    tables: Vec<ManifestTable>,
    foreign_keys: Vec<ForeignKey>,
}

/// Sink writing each table to `<dir>/<table>.sql`.
struct SqlDirSink {
    dir: PathBuf,
    tables: Vec<ManifestTable>,
    foreign_keys: Vec<ForeignKey>,
}

impl SqlDirSink {
    fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            tables: Vec::new(),
            foreign_keys: Vec::new(),
        })
    }
}

impl SchemaSink for SqlDirSink {
    type TableId = String;

    fn create_table(&mut self, table: &Table) -> Result<String> {
        let file = format!("{}.sql", table.name);
        if Path::new(&file).file_name().and_then(|f| f.to_str()) != Some(file.as_str()) {
            anyhow::bail!("table name `{}` is not a plain file name", table.name);
        }
        let path = self.dir.join(&file);
        let mut sql = literal_select(table);
        sql.push_str(";\n");
        fs::write(&path, sql).with_context(|| format!("failed to write {}", path.display()))?;
        debug!(path = %path.display(), "wrote table");

        self.tables.push(ManifestTable {
            name: table.name.clone(),
            file,
            rows: table.row_count(),
            columns: table.columns.clone(),
            pull: select_statement(table),
        });
        Ok(table.name.clone())
    }

    fn create_foreign_key(&mut self, _parent: &String, _child: &String, fk: &ForeignKey) -> Result<()> {
        self.foreign_keys.push(fk.clone());
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ExportReport {
    out: String,
    manifest: String,
    tables: usize,
    foreign_keys: usize,
    fingerprint: String,
}

/// Execute `ocelfk export-sql`.
pub fn run_export_sql(args: &ExportSqlArgs, project: DeriveConfig, output: OutputMode) -> Result<()> {
    let schema = derive_schema(&args.options, project, output)?;

    let written = write_export(&schema, &args.out);
    let report = match written {
        Ok(report) => report,
        Err(err) => {
            render_error(output, &CliError::coded(ErrorCode::ExportFailed, format!("{err:#}")))?;
            return Err(err);
        }
    };

    render_mode(output, &report, render_text, render_pretty)
}

fn write_export(schema: &ocelfk_graph::DerivedSchema, dir: &Path) -> Result<ExportReport> {
    let mut sink = SqlDirSink::create(dir)?;
    publish(schema, &mut sink)?;

    let manifest = Manifest {
        lead: schema.lead.clone(),
        namespace: schema.namespace.clone(),
        fingerprint: schema.fingerprint.clone(),
        tables: sink.tables,
        foreign_keys: sink.foreign_keys,
    };
    let manifest_path = dir.join(MANIFEST_FILE);
    let body = serde_json::to_string_pretty(&manifest)?;
    fs::write(&manifest_path, body + "\n")
        .with_context(|| format!("failed to write {}", manifest_path.display()))?;

    info!(dir = %dir.display(), tables = manifest.tables.len(), "exported schema");
    Ok(ExportReport {
        out: dir.display().to_string(),
        manifest: manifest_path.display().to_string(),
        tables: manifest.tables.len(),
        foreign_keys: manifest.foreign_keys.len(),
        fingerprint: manifest.fingerprint,
    })
}

fn render_text(report: &ExportReport, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "exported {} tables {} foreign keys to {}",
        report.tables, report.foreign_keys, report.out
    )
}

fn render_pretty(report: &ExportReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_kv(w, "directory", &report.out)?;
    pretty_kv(w, "manifest", &report.manifest)?;
    pretty_kv(w, "tables", report.tables.to_string())?;
    pretty_kv(w, "keys", report.foreign_keys.to_string())?;
    pretty_kv(w, "fingerprint", &report.fingerprint)
}
