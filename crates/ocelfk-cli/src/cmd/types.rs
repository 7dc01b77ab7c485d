use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use ocelfk_core::catalog::{TypeCatalog, TypeEntry};
use ocelfk_core::config::DeriveConfig;

use crate::cmd::load_log;
use crate::output::{CliError, OutputMode, pretty_section, render_error, render_mode};

#[derive(Args, Debug, Default)]
pub struct TypesArgs {
    /// Path to the event log (JSON).
    pub log: PathBuf,
}

/// Execute `ocelfk types`: list event and object types with their
/// normalized names.
pub fn run_types(args: &TypesArgs, project: &DeriveConfig, output: OutputMode) -> anyhow::Result<()> {
    let log = load_log(&args.log, output)?;
    let catalog = match TypeCatalog::extract(&log, project.max_identifier_len) {
        Ok(catalog) => catalog,
        Err(err) => {
            render_error(output, &CliError::from(&err))?;
            return Err(err.into());
        }
    };
    render_mode(output, &catalog, render_text, render_pretty)
}

fn render_text(catalog: &TypeCatalog, w: &mut dyn Write) -> std::io::Result<()> {
    text_lines(w, "event", catalog.event_types())?;
    text_lines(w, "object", catalog.object_types())
}

fn text_lines(w: &mut dyn Write, kind: &str, entries: &[TypeEntry]) -> std::io::Result<()> {
    for entry in entries {
        writeln!(w, "{kind}\t{}\t{}\t{}", entry.name, entry.count, entry.raw)?;
    }
    Ok(())
}

fn render_pretty(catalog: &TypeCatalog, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_types(w, "Event types", catalog.event_types())?;
    writeln!(w)?;
    pretty_types(w, "Object types", catalog.object_types())
}

fn pretty_types(w: &mut dyn Write, heading: &str, entries: &[TypeEntry]) -> std::io::Result<()> {
    pretty_section(w, &format!("{heading} ({})", entries.len()))?;
    for entry in entries {
        writeln!(w, "{:<32} {:>8}  {}", entry.name, entry.count, entry.raw)?;
    }
    Ok(())
}
