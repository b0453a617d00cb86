use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::paths;
use crate::permissions::FileVisibility;
use crate::utils::io;

/// User-tunable settings, read from settings.json.
///
/// Every field has a default so partial files are valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Explicit path to the `gh` executable; skips discovery when it exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gh_path: Option<PathBuf>,

    /// `OWNER/NAME` passed as `--repo` to every workflow run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    /// Branch or tag passed as `--ref` to every workflow run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,

    #[serde(default = "default_invocation_timeout_secs")]
    pub invocation_timeout_secs: u64,

    /// Minimum number of concurrent invocations per batch.
    #[serde(default = "default_concurrency_floor")]
    pub concurrency_floor: usize,

    /// Workflow input that receives the per-target value.
    #[serde(default = "default_target_field")]
    pub target_field: String,

    #[serde(default)]
    pub workflows: WorkflowNames,

    #[serde(default)]
    pub api: ApiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gh_path: None,
            repo: None,
            git_ref: None,
            invocation_timeout_secs: default_invocation_timeout_secs(),
            concurrency_floor: default_concurrency_floor(),
            target_field: default_target_field(),
            workflows: WorkflowNames::default(),
            api: ApiSettings::default(),
        }
    }
}

impl Settings {
    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_secs(self.invocation_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNames {
    #[serde(default = "default_create_image_workflow")]
    pub create_image: String,
    #[serde(default = "default_promote_image_workflow")]
    pub promote_image: String,
}

impl Default for WorkflowNames {
    fn default() -> Self {
        Self {
            create_image: default_create_image_workflow(),
            promote_image: default_promote_image_workflow(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettings {
    #[serde(default = "default_api_domain")]
    pub domain: String,
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            domain: default_api_domain(),
            timeout_secs: default_api_timeout_secs(),
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_invocation_timeout_secs() -> u64 {
    300
}

fn default_concurrency_floor() -> usize {
    3
}

fn default_target_field() -> String {
    "service".to_string()
}

fn default_create_image_workflow() -> String {
    "OnvioBR - Create AMI".to_string()
}

fn default_promote_image_workflow() -> String {
    "OnvioBR - Promotion AMI".to_string()
}

fn default_api_domain() -> String {
    "onvio.com.br".to_string()
}

fn default_api_timeout_secs() -> u64 {
    30
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load settings from the default location, falling back to built-in
/// defaults when the file is missing or invalid.
pub fn load_settings() -> Settings {
    match paths::settings_json() {
        Ok(path) => load_settings_from(&path),
        Err(e) => {
            tracing::warn!(error = %e, "no settings location, using defaults");
            Settings::default()
        }
    }
}

/// Load settings from `path`. Missing files are silent; invalid ones warn.
pub fn load_settings_from(path: &Path) -> Settings {
    match read_settings(path) {
        Ok(Some(settings)) => settings,
        Ok(None) => Settings::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, details = %e.details, "ignoring settings file");
            Settings::default()
        }
    }
}

fn read_settings(path: &Path) -> Result<Option<Settings>> {
    let Some(content) = io::read_optional(path)? else {
        return Ok(None);
    };

    let settings = serde_json::from_str(&content).map_err(|e| {
        Error::validation_invalid_json(e, Some(format!("parse {}", path.display())))
    })?;
    Ok(Some(settings))
}

/// Save settings to the default location (creates if missing).
pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(&paths::settings_json()?, settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings).map_err(|e| {
        Error::internal_json(e.to_string(), Some("serialize settings".to_string()))
    })?;
    io::write_file_atomic(path, &content, FileVisibility::Shared)
}

/// Delete settings.json (reset to defaults). Returns whether a file existed.
pub fn reset_settings() -> Result<bool> {
    let path = paths::settings_json()?;

    if path.exists() {
        fs::remove_file(&path).map_err(|e| {
            Error::persistence_write(path.display().to_string(), e.to_string())
        })?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Path to settings.json (for display purposes).
pub fn settings_path() -> Result<String> {
    Ok(paths::settings_json()?.display().to_string())
}
