use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "batchflow";

/// Base application directory under the per-user configuration directory.
///
/// `%APPDATA%\batchflow` on Windows, `~/Library/Application Support/batchflow`
/// on macOS, `$XDG_CONFIG_HOME/batchflow` (or `~/.config/batchflow`) elsewhere.
pub fn app_dir() -> Result<PathBuf> {
    if let Some(dir) = dirs::config_dir() {
        return Ok(dir.join(APP_DIR));
    }

    let home = env::var("HOME").map_err(|_| {
        Error::internal_unexpected("No user configuration directory and HOME is not set")
    })?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

/// Saved logins and company identifiers, one section per environment.
pub fn credentials_json() -> Result<PathBuf> {
    Ok(app_dir()?.join("credentials.json"))
}

/// Recent dispatch runs.
pub fn history_json() -> Result<PathBuf> {
    Ok(app_dir()?.join("history.json"))
}

/// User overrides for built-in settings.
pub fn settings_json() -> Result<PathBuf> {
    Ok(app_dir()?.join("settings.json"))
}
