//! Running one external action for one target.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, InvocationFailedDetails, InvocationTimeoutDetails, Result};
use crate::settings::Settings;
use crate::utils::command;

/// Ordered `key=value` inputs for an action.
///
/// Insertion order is kept so the argument vector is deterministic; setting
/// an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionArgs {
    fields: Vec<(String, String)>,
}

impl ActionArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(field) => field.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ActionArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = ActionArgs::new();
        for (k, v) in iter {
            args.set(k, v);
        }
        args
    }
}

/// Something that can run a named action with inputs.
///
/// `Ok` carries a human-readable success message. Failures are
/// `invocation.*` errors whose details include the captured output.
pub trait ActionInvoker: Send + Sync {
    fn invoke(&self, action: &str, args: &ActionArgs) -> Result<String>;
}

/// Triggers GitHub Actions workflows with `gh workflow run`.
#[derive(Debug, Clone)]
pub struct GhWorkflowInvoker {
    program: PathBuf,
    repo: Option<String>,
    git_ref: Option<String>,
    timeout: Duration,
}

impl GhWorkflowInvoker {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            repo: None,
            git_ref: None,
            timeout,
        }
    }

    pub fn from_settings(program: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            program: program.into(),
            repo: settings.repo.clone(),
            git_ref: settings.git_ref.clone(),
            timeout: settings.invocation_timeout(),
        }
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    /// Full argument vector for one run. Values are passed as single
    /// arguments and never go through a shell.
    pub fn build_args(&self, action: &str, args: &ActionArgs) -> Vec<String> {
        let mut argv = vec!["workflow".to_string(), "run".to_string(), action.to_string()];

        if let Some(repo) = &self.repo {
            argv.push("--repo".to_string());
            argv.push(repo.clone());
        }
        if let Some(git_ref) = &self.git_ref {
            argv.push("--ref".to_string());
            argv.push(git_ref.clone());
        }

        for (key, value) in args.iter() {
            argv.push("-f".to_string());
            argv.push(format!("{}={}", key, value));
        }

        argv
    }
}

impl ActionInvoker for GhWorkflowInvoker {
    fn invoke(&self, action: &str, args: &ActionArgs) -> Result<String> {
        let program = self.program.display().to_string();
        let argv = self.build_args(action, args);

        tracing::info!(
            action,
            program = %program,
            inputs = ?args.keys().collect::<Vec<_>>(),
            "triggering workflow"
        );

        let output = command::run_with_timeout(&program, &argv, self.timeout)
            .map_err(|e| Error::invocation_spawn_failed(action, program.as_str(), e.to_string()))?;

        let combined = output.combined();
        tracing::debug!(action, output = %combined, "workflow command output");

        if output.timed_out {
            return Err(Error::invocation_timeout(InvocationTimeoutDetails {
                action: action.to_string(),
                program,
                timeout_secs: self.timeout.as_secs(),
                output: combined,
            }));
        }

        if !output.success() {
            return Err(Error::invocation_failed(InvocationFailedDetails {
                action: action.to_string(),
                program,
                exit_code: output.exit_code(),
                output: combined,
            }));
        }

        if combined.trim().is_empty() {
            Ok(format!("Workflow '{}' triggered", action))
        } else {
            Ok(combined.trim().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_args_replace_in_place() {
        let args = ActionArgs::new()
            .with("service", "billing")
            .with("version", "1.0")
            .with("service", "payroll");

        assert_eq!(args.len(), 2);
        assert_eq!(args.get("service"), Some("payroll"));
        assert_eq!(args.keys().collect::<Vec<_>>(), vec!["service", "version"]);
    }

    #[test]
    fn build_args_enumerates_every_input() {
        let settings = Settings {
            repo: Some("acme/infra".to_string()),
            git_ref: Some("main".to_string()),
            ..Settings::default()
        };
        let invoker = GhWorkflowInvoker::from_settings("gh", &settings);
        let args = ActionArgs::new()
            .with("service", "billing; rm -rf /")
            .with("version", "2.0.1");

        assert_eq!(
            invoker.build_args("Create Image", &args),
            vec![
                "workflow",
                "run",
                "Create Image",
                "--repo",
                "acme/infra",
                "--ref",
                "main",
                "-f",
                "service=billing; rm -rf /",
                "-f",
                "version=2.0.1",
            ]
        );
    }

    #[test]
    fn missing_program_is_a_spawn_failure() {
        let invoker = GhWorkflowInvoker::new("/nonexistent/gh-xyz", Duration::from_secs(5));
        let err = invoker.invoke("Create Image", &ActionArgs::new()).unwrap_err();
        assert_eq!(err.code.as_str(), "invocation.spawn_failed");
        assert!(!err.hints.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_embeds_output() {
        // `false` ignores its arguments and exits 1.
        let invoker = GhWorkflowInvoker::new("false", Duration::from_secs(5));
        let err = invoker.invoke("Create Image", &ActionArgs::new()).unwrap_err();
        assert_eq!(err.code.as_str(), "invocation.failed");
        assert_eq!(err.details["exitCode"], 1);
    }

    #[cfg(unix)]
    #[test]
    fn zero_exit_is_success_with_message() {
        let invoker = GhWorkflowInvoker::new("true", Duration::from_secs(5));
        let message = invoker.invoke("Create Image", &ActionArgs::new()).unwrap();
        assert_eq!(message, "Workflow 'Create Image' triggered");
    }

    #[cfg(unix)]
    #[test]
    fn timeout_reports_output_captured_so_far() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-gh");
        std::fs::write(&script, "#!/bin/sh\necho started\nexec sleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let invoker = GhWorkflowInvoker::new(&script, Duration::from_millis(300));
        let err = invoker.invoke("Create Image", &ActionArgs::new()).unwrap_err();

        assert_eq!(err.code.as_str(), "invocation.timeout");
        assert!(err.message.contains("started"), "message: {}", err.message);
        assert_eq!(err.details["output"], "started");
    }
}
