use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::io::IsTerminal;
use std::path::Path;
use std::str::FromStr;

use crate::error::DeriveError;
use crate::normalize::DEFAULT_MAX_IDENTIFIER_LEN;

/// File name of the per-project config, looked up in the project root.
pub const PROJECT_CONFIG_FILE: &str = "ocelfk.toml";

/// How the graph builder decides that an object-to-object candidate would
/// close a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Reject only when the candidate's own endpoints are already connected.
    #[default]
    Scoped,
    /// Reject when the working graph would contain any cycle at all.
    Global,
}

impl CyclePolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scoped => "scoped",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for CyclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CyclePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scoped" => Ok(Self::Scoped),
            "global" => Ok(Self::Global),
            other => Err(format!(
                "unknown cycle policy '{other}' (expected 'scoped' or 'global')"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeriveConfig {
    /// Raw or normalized lead object type. Required by the time `derive`
    /// runs; the CLI flag overrides the file.
    #[serde(default)]
    pub lead_object_type: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_max_identifier_len")]
    pub max_identifier_len: usize,
    #[serde(default)]
    pub cycle_policy: CyclePolicy,
    #[serde(default = "default_true")]
    pub scope_to_lead: bool,
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            lead_object_type: None,
            namespace: default_namespace(),
            max_identifier_len: default_max_identifier_len(),
            cycle_policy: CyclePolicy::default(),
            scope_to_lead: default_true(),
        }
    }
}

impl DeriveConfig {
    /// Check that the namespace can be spliced into table and file names.
    ///
    /// # Errors
    ///
    /// Returns [`DeriveError::InvalidNamespace`] for an empty namespace or
    /// one holding anything but ASCII letters, digits and `_`.
    pub fn validate_namespace(&self) -> Result<(), DeriveError> {
        let ns = self.namespace.as_str();
        if ns.is_empty() || !ns.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DeriveError::InvalidNamespace {
                namespace: ns.to_string(),
            });
        }
        Ok(())
    }

    /// Default config with the given lead type.
    pub fn with_lead(lead: impl Into<String>) -> Self {
        Self {
            lead_object_type: Some(lead.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub derive: DeriveConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Load `ocelfk.toml` from `project_root`, or defaults when it is absent.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_CONFIG_FILE);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// # Errors
///
/// Fails when the user config exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };
    load_user_config_from(&config_dir.join("ocelfk/config.toml"))
}

fn load_user_config_from(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Project config, user config and the resolved output mode.
///
/// # Errors
///
/// Propagates config loading failures.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.as_deref(), env_format.as_deref());

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_true() -> bool {
    true
}

fn default_namespace() -> String {
    "custom".to_string()
}

const fn default_max_identifier_len() -> usize {
    DEFAULT_MAX_IDENTIFIER_LEN
}
