//! Locating the GitHub CLI and checking that it is usable.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::settings::Settings;
use crate::utils::command;

const GH: &str = "gh";
const STATUS_TIMEOUT: Duration = Duration::from_secs(15);

/// Find the `gh` executable.
///
/// Order: the explicit `ghPath` setting, the executable search path, then
/// (Windows only) a fixed list of installer locations. Falls back to the bare
/// name so a later spawn failure reports a clear "not found".
pub fn locate_gh(settings: &Settings) -> PathBuf {
    if let Some(explicit) = settings.gh_path.as_ref().filter(|p| p.is_file()) {
        return explicit.clone();
    }

    if let Ok(found) = which::which(GH) {
        return found;
    }

    known_install_locations()
        .into_iter()
        .find(|p| is_trusted_executable(p))
        .unwrap_or_else(|| PathBuf::from(GH))
}

#[cfg(windows)]
fn known_install_locations() -> Vec<PathBuf> {
    let under = |var: &str, parts: &[&str]| {
        std::env::var_os(var).map(|base| parts.iter().fold(PathBuf::from(base), |p, s| p.join(s)))
    };

    [
        under("ProgramFiles", &["GitHub CLI", "gh.exe"]),
        under("ProgramFiles(x86)", &["GitHub CLI", "gh.exe"]),
        under("LOCALAPPDATA", &["Programs", "GitHub CLI", "gh.exe"]),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(not(windows))]
fn known_install_locations() -> Vec<PathBuf> {
    Vec::new()
}

/// Absolute, existing, regular `.exe` files only.
fn is_trusted_executable(path: &Path) -> bool {
    path.is_absolute()
        && path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhStatus {
    pub installed: bool,
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Check whether `gh` runs and is logged in. Problems are reported in
/// `error`, never as `Err`.
pub fn check_status(program: &Path) -> GhStatus {
    let program = program.display().to_string();
    let mut status = GhStatus::default();

    if !command::succeeds(&program, &["--version".to_string()], STATUS_TIMEOUT) {
        tracing::warn!(program = %program, "GitHub CLI not found");
        status.error = Some(
            "GitHub CLI (gh) not found. Install it from https://cli.github.com/".to_string(),
        );
        return status;
    }
    status.installed = true;

    let auth = match command::run_with_timeout(
        &program,
        &["auth".to_string(), "status".to_string()],
        STATUS_TIMEOUT,
    ) {
        Ok(out) => out,
        Err(e) => {
            status.error = Some(format!("Could not run gh auth status: {}", e));
            return status;
        }
    };

    let combined = auth.combined();
    tracing::debug!(output = %combined, "gh auth status");

    if !auth.success() {
        tracing::warn!("GitHub CLI is not authenticated");
        status.error = Some(format!(
            "GitHub CLI is not authenticated. Run: gh auth login ({})",
            combined.trim()
        ));
        return status;
    }
    status.authenticated = true;

    status.user = parse_auth_user(&combined).or_else(|| api_login(&program));
    tracing::info!(user = ?status.user, "GitHub CLI authenticated");
    status
}

/// Pull the account name out of `gh auth status` output.
///
/// Handles `Logged in to github.com account NAME (keyring)` and the older
/// `Logged in to github.com as NAME`.
pub fn parse_auth_user(output: &str) -> Option<String> {
    static ACCOUNT: OnceLock<Regex> = OnceLock::new();
    static LEGACY: OnceLock<Regex> = OnceLock::new();

    let account = ACCOUNT.get_or_init(|| {
        Regex::new(r"(?i)logged in to \S+ account ([^\s(]+)").expect("valid regex")
    });
    let legacy =
        LEGACY.get_or_init(|| Regex::new(r"(?i)logged in to \S+ as ([^\s(]+)").expect("valid regex"));

    output.lines().find_map(|line| {
        account
            .captures(line)
            .or_else(|| legacy.captures(line))
            .map(|caps| caps[1].to_string())
    })
}

fn api_login(program: &str) -> Option<String> {
    let args: Vec<String> = ["api", "user", "--jq", ".login"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let out = command::run_with_timeout(program, &args, STATUS_TIMEOUT).ok()?;
    if !out.success() {
        return None;
    }
    let login = out.stdout.trim();
    (!login.is_empty()).then(|| login.to_string())
}
