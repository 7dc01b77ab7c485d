#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use ocelfk_core::config::resolve_config;
use ocelfk_core::error::ErrorCode;
use output::{CliError, OutputMode, render_error};
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ocelfk: derive a foreign-key schema from an object-centric event log",
    long_about = None
)]
struct Cli {
    /// Log derivation stages at debug level (ignored when OCELFK_LOG is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Derive the schema of an event log",
        long_about = "Classify every relation of the log, build an acyclic schema graph around the lead object type and print the resulting tables and foreign keys.",
        after_help = "EXAMPLES:\n    # Derive around the orders object type\n    ocelfk derive log.json --lead orders\n\n    # Check o2o candidates against every cycle, not only new ones\n    ocelfk derive log.json --lead orders --cycle-policy global\n\n    # Emit machine-readable output\n    ocelfk derive log.json --lead orders --json"
    )]
    Derive(cmd::derive::DeriveArgs),

    #[command(
        name = "export-sql",
        about = "Write the derived tables as SQL files",
        long_about = "Derive the schema and write one literal SQL file per table plus a schema.json manifest with pull statements and foreign keys.",
        after_help = "EXAMPLES:\n    # Export into ./out\n    ocelfk export-sql log.json --lead orders --out out\n\n    # Use a custom table namespace\n    ocelfk export-sql log.json --lead orders --namespace sales --out out"
    )]
    ExportSql(cmd::export_sql::ExportSqlArgs),

    #[command(
        about = "List event and object types",
        long_about = "List the distinct activities and object types of a log with their normalized names and record counts.",
        after_help = "EXAMPLES:\n    # Show the types of a log\n    ocelfk types log.json\n\n    # Emit machine-readable output\n    ocelfk types log.json --json"
    )]
    Types(cmd::types::TypesArgs),
}

const DEFAULT_FILTER: &str = "ocelfk=info,warn";
const DEBUG_FILTER: &str = "ocelfk=debug,ocelfk_core=debug,ocelfk_graph=debug,info";

/// Filter used when OCELFK_LOG is unset.
const fn default_filter(verbose: bool, debug_env: bool) -> &'static str {
    if verbose || debug_env { DEBUG_FILTER } else { DEFAULT_FILTER }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("OCELFK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose, env::var("DEBUG").is_ok())));

    let format = env::var("OCELFK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(verbose = cli.verbose, "tracing initialized");

    let project_root = env::current_dir()?;
    let config = match resolve_config(&project_root, cli.json) {
        Ok(config) => config,
        Err(err) => {
            let mode = if cli.json { OutputMode::Json } else { OutputMode::Text };
            render_error(mode, &CliError::coded(ErrorCode::ConfigParseError, format!("{err:#}")))?;
            return Err(err);
        }
    };
    let output = OutputMode::from_resolved(&config.resolved_output);
    let project = config.project.derive;

    match cli.command {
        Commands::Derive(ref args) => cmd::derive::run_derive(args, project, output),
        Commands::ExportSql(ref args) => cmd::export_sql::run_export_sql(args, project, output),
        Commands::Types(ref args) => cmd::types::run_types(args, &project, output),
    }
}
