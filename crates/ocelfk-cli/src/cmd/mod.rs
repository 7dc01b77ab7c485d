//! Command handlers and the argument plumbing they share.

pub mod derive;
pub mod export_sql;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use ocelfk_core::config::{CyclePolicy, DeriveConfig};
use ocelfk_core::error::ErrorCode;
use ocelfk_core::log::EventLog;
use ocelfk_graph::DerivedSchema;
use tracing::info;

use crate::output::{CliError, OutputMode, render_error};

/// Derivation options shared by `derive` and `export-sql`.
///
/// Flags override `[derive]` in `ocelfk.toml`.
#[derive(Args, Debug, Clone, Default)]
pub struct DeriveOptions {
    /// Path to the event log (JSON).
    pub log: PathBuf,

    /// Lead object type (raw label or normalized name).
    #[arg(long)]
    pub lead: Option<String>,

    /// Table name namespace (`e_<ns>_...`).
    #[arg(long)]
    pub namespace: Option<String>,

    /// Cycle check for object-to-object relations: `scoped` or `global`.
    #[arg(long, value_parser = clap::value_parser!(CyclePolicy))]
    pub cycle_policy: Option<CyclePolicy>,

    /// Keep activities that never touch the lead object type.
    #[arg(long)]
    pub no_scope: bool,
}

impl DeriveOptions {
    /// Overlay the flags on the project config.
    pub fn apply(&self, mut config: DeriveConfig) -> DeriveConfig {
        if let Some(lead) = &self.lead {
            config.lead_object_type = Some(lead.clone());
        }
        if let Some(namespace) = &self.namespace {
            config.namespace.clone_from(namespace);
        }
        if let Some(policy) = self.cycle_policy {
            config.cycle_policy = policy;
        }
        if self.no_scope {
            config.scope_to_lead = false;
        }
        config
    }
}

/// Read and parse an event log.
pub fn load_log(path: &Path, output: OutputMode) -> anyhow::Result<EventLog> {
    let parsed = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))
        .and_then(|text| {
            EventLog::from_json_str(&text)
                .with_context(|| format!("Failed to parse {}", path.display()))
        });

    match parsed {
        Ok(log) => {
            let (events, objects, relations, object_relations) = log.counts();
            info!(path = %path.display(), events, objects, relations, object_relations, "loaded event log");
            Ok(log)
        }
        Err(err) => {
            render_error(output, &CliError::coded(ErrorCode::LogParseError, format!("{err:#}")))?;
            Err(err)
        }
    }
}

/// Load the log named by `options` and derive its schema, reporting
/// failures through the output layer.
pub fn derive_schema(
    options: &DeriveOptions,
    project: DeriveConfig,
    output: OutputMode,
) -> anyhow::Result<DerivedSchema> {
    let config = options.apply(project);
    let Some(lead) = config.lead_object_type.clone() else {
        render_error(
            output,
            &CliError::coded(ErrorCode::MissingLeadType, "no lead object type given"),
        )?;
        anyhow::bail!("no lead object type given");
    };

    let log = load_log(&options.log, output)?;
    match ocelfk_graph::derive(&log, &lead, &config) {
        Ok(schema) => Ok(schema),
        Err(err) => {
            render_error(output, &CliError::from(&err))?;
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_project_config() {
        let project = DeriveConfig {
            lead_object_type: Some("orders".to_string()),
            namespace: "sales".to_string(),
            ..DeriveConfig::default()
        };
        let options = DeriveOptions {
            lead: Some("items".to_string()),
            cycle_policy: Some(CyclePolicy::Global),
            no_scope: true,
            ..DeriveOptions::default()
        };

        let config = options.apply(project);
        assert_eq!(config.lead_object_type.as_deref(), Some("items"));
        assert_eq!(config.namespace, "sales");
        assert_eq!(config.cycle_policy, CyclePolicy::Global);
        assert!(!config.scope_to_lead);
    }

    #[test]
    fn derive_failure_keeps_its_typed_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("log.json");
        std::fs::write(
            &log,
            r#"{"events": [{"id": "e1", "activity": "ship", "timestamp": "2024-01-01T00:00:00Z"}],
                "objects": [{"id": "p1", "type": "parcel"}],
                "relations": [{"event_id": "e1", "object_id": "p1", "activity": "ship", "object_type": "parcel"}]}"#,
        )
        .expect("write log");
        let options = DeriveOptions {
            log,
            lead: Some("parcel".to_string()),
            namespace: Some("../evil".to_string()),
            ..DeriveOptions::default()
        };

        let err = derive_schema(&options, DeriveConfig::default(), OutputMode::Text).expect_err("namespace");
        assert!(matches!(
            err.downcast_ref::<ocelfk_core::error::DeriveError>(),
            Some(ocelfk_core::error::DeriveError::InvalidNamespace { .. })
        ));
    }

    #[test]
    fn absent_flags_keep_project_config() {
        let project = DeriveConfig::with_lead("orders");
        let config = DeriveOptions::default().apply(project.clone());
        assert_eq!(config, project);
    }
}
