//! Operations exposed to the front end.
//!
//! `App` owns the stores and the dispatcher for one process. Every input is
//! validated before anything external is touched.

use std::path::PathBuf;
use std::sync::Arc;

use crate::credentials::{CredentialStore, SavedCompanyId, SavedLogin};
use crate::dispatch::{self, Dispatcher};
use crate::error::{Error, Result};
use crate::gh::{self, GhStatus};
use crate::history::{HistoryEntry, HistoryStore, NewHistoryEntry};
use crate::invoker::{ActionArgs, ActionInvoker, GhWorkflowInvoker};
use crate::output::{BatchReport, DispatchResult};
use crate::session::{AuthResult, SessionClient, SessionInfo};
use crate::settings::{self, Settings};
use crate::utils::validation;
use crate::workflow::{CreateImageRequest, PromoteImageRequest, WorkflowKind};

pub struct App {
    settings: Settings,
    credentials: CredentialStore,
    history: HistoryStore,
    dispatcher: Dispatcher,
    gh_program: Option<PathBuf>,
}

impl App {
    pub fn new(
        settings: Settings,
        credentials: CredentialStore,
        history: HistoryStore,
        invoker: Arc<dyn ActionInvoker>,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            invoker,
            dispatch::host_bound(settings.concurrency_floor),
            settings.target_field.clone(),
        );

        Self {
            settings,
            credentials,
            history,
            dispatcher,
            gh_program: None,
        }
    }

    /// Use an already located `gh` for status checks instead of searching
    /// for it on each call.
    pub fn with_gh_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.gh_program = Some(program.into());
        self
    }

    /// Wire the default store locations and the `gh` invoker.
    pub fn open() -> Result<Self> {
        let settings = settings::load_settings();
        let program = gh::locate_gh(&settings);
        tracing::debug!(program = %program.display(), "using GitHub CLI");

        let invoker = Arc::new(GhWorkflowInvoker::from_settings(program.clone(), &settings));
        Ok(Self::new(
            settings,
            CredentialStore::open_default()?,
            HistoryStore::open_default()?,
            invoker,
        )
        .with_gh_program(program))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn concurrency_bound(&self) -> usize {
        self.dispatcher.bound()
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Run `action` once with `params`, which must carry the target field.
    pub fn dispatch_single(&self, action: &str, params: &ActionArgs) -> Result<DispatchResult> {
        let action = validation::require_non_empty(action, "action", "Action name is required")?;
        let field = self.dispatcher.target_field();
        let target = validation::require(params.get(field), field)?;
        let target = validation::require_non_empty(target, field, "Target is required")?;

        Ok(self.dispatcher.dispatch_single(action, target, params))
    }

    /// Run `action` for every target. An empty list is a zero-total report.
    pub fn dispatch_batch(
        &self,
        action: &str,
        targets: &[String],
        shared: &ActionArgs,
    ) -> Result<BatchReport> {
        let action = validation::require_non_empty(action, "action", "Action name is required")?;
        validation::require_no_blank_entries(targets, self.dispatcher.target_field())?;

        Ok(self.dispatcher.dispatch(action, targets, shared))
    }

    /// Build an image for each service, then record the run.
    pub fn trigger_create_image_batch(
        &self,
        jdk_version: &str,
        services: &[String],
        version: &str,
    ) -> Result<BatchReport> {
        let request = CreateImageRequest::new(jdk_version, services, version)?;
        let action = WorkflowKind::CreateImage.action_name(&self.settings.workflows);

        let report = self
            .dispatcher
            .dispatch(action, &request.services, &request.shared_args());
        self.record(request.history_entry(&report));
        Ok(report)
    }

    /// Promote one service's image to an environment, then record the run.
    pub fn trigger_promotion(
        &self,
        environment: &str,
        service: &str,
        version: &str,
    ) -> Result<DispatchResult> {
        let request = PromoteImageRequest::new(environment, service, version)?;
        let action = WorkflowKind::PromoteImage.action_name(&self.settings.workflows);

        let result = self
            .dispatcher
            .dispatch_single(action, &request.service, &request.shared_args());
        self.record(request.history_entry(result.success));
        Ok(result)
    }

    /// A finished run is not undone because its history entry could not be saved.
    fn record(&self, entry: NewHistoryEntry) {
        if let Err(e) = self.history.add(entry) {
            tracing::warn!(error = %e, "could not record run in history");
        }
    }

    pub fn check_gh(&self) -> GhStatus {
        match &self.gh_program {
            Some(program) => gh::check_status(program),
            None => gh::check_status(&gh::locate_gh(&self.settings)),
        }
    }

    // =========================================================================
    // Credentials
    // =========================================================================

    pub fn list_logins(&self, env: &str) -> Result<Vec<SavedLogin>> {
        self.credentials.list_logins(require_env(env)?)
    }

    pub fn save_login(&self, env: &str, name: &str, username: &str, secret: &str) -> Result<()> {
        self.credentials
            .save_login(require_env(env)?, name, username, secret)
    }

    pub fn delete_login(&self, env: &str, id: &str) -> Result<()> {
        self.credentials.delete_login(env.trim(), id)
    }

    pub fn touch_login(&self, env: &str, id: &str) -> Result<()> {
        self.credentials.touch_login(env.trim(), id)
    }

    pub fn list_company_ids(&self, env: &str) -> Result<Vec<SavedCompanyId>> {
        self.credentials.list_company_ids(require_env(env)?)
    }

    pub fn save_company_id(&self, env: &str, name: &str, company_id: &str) -> Result<()> {
        self.credentials
            .save_company_id(require_env(env)?, name, company_id)
    }

    pub fn delete_company_id(&self, env: &str, id: &str) -> Result<()> {
        self.credentials.delete_company_id(env.trim(), id)
    }

    pub fn touch_company_id(&self, env: &str, id: &str) -> Result<()> {
        self.credentials.touch_company_id(env.trim(), id)
    }

    // =========================================================================
    // History
    // =========================================================================

    pub fn list_history(&self) -> Result<Vec<HistoryEntry>> {
        self.history.list()
    }

    pub fn list_history_by_type(&self, category: &str) -> Result<Vec<HistoryEntry>> {
        self.history.list_by_category(category)
    }

    pub fn add_history_entry(&self, entry: NewHistoryEntry) -> Result<HistoryEntry> {
        validation::require_non_empty(&entry.category, "type", "History entry type is required")?;
        self.history.add(entry)
    }

    pub fn clear_history(&self) -> Result<()> {
        self.history.clear()
    }

    pub fn delete_history_entry(&self, id: &str) -> Result<()> {
        self.history.delete(id)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    pub fn authenticate_with_credentials(
        &self,
        env: &str,
        username: &str,
        secret: &str,
    ) -> AuthResult {
        match self.session_client(env) {
            Ok(client) => client.authenticate_with_credentials(env.trim(), username, secret),
            Err(e) => auth_error(e),
        }
    }

    pub fn authenticate_with_company_id(&self, env: &str, company_id: &str) -> AuthResult {
        match self.session_client(env) {
            Ok(client) => client.authenticate_with_company_id(env.trim(), company_id),
            Err(e) => auth_error(e),
        }
    }

    pub fn session_info(&self, env: &str, long_token: &str) -> SessionInfo {
        match self.session_client(env) {
            Ok(client) => client.session_info(env.trim(), long_token),
            Err(e) => SessionInfo {
                error: Some(e.message),
                ..SessionInfo::default()
            },
        }
    }

    fn session_client(&self, env: &str) -> Result<SessionClient> {
        require_env(env)?;
        SessionClient::new(&self.settings.api)
    }
}

/// Environment names are keyed trimmed; every credential operation goes
/// through the same form.
fn require_env(env: &str) -> Result<&str> {
    validation::require_non_empty(env, "environment", "Environment is required")
}

fn auth_error(e: Error) -> AuthResult {
    AuthResult {
        error: Some(e.message),
        ..AuthResult::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recording {
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, ActionArgs)>>,
    }

    impl ActionInvoker for Recording {
        fn invoke(&self, action: &str, args: &ActionArgs) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((action.to_string(), args.clone()));
            Ok("queued".to_string())
        }
    }

    fn app(dir: &TempDir, invoker: Arc<Recording>) -> App {
        App::new(
            Settings::default(),
            CredentialStore::new(dir.path().join("credentials.json")),
            HistoryStore::new(dir.path().join("history.json")),
            invoker,
        )
    }

    #[test]
    fn validation_runs_before_any_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = Arc::new(Recording::default());
        let app = app(&dir, invoker.clone());

        assert!(app.trigger_create_image_batch("", &[], "1.0").is_err());
        assert!(app.trigger_promotion("qa", "", "1.0").is_err());
        assert!(app.dispatch_single("Deploy", &ActionArgs::new()).is_err());
        assert!(app
            .dispatch_batch("", &["a".to_string()], &ActionArgs::new())
            .is_err());

        assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
        assert!(app.list_history().unwrap().is_empty());
    }

    #[test]
    fn create_image_batch_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = Arc::new(Recording::default());
        let app = app(&dir, invoker.clone());
        let services = vec!["billing".to_string(), "ledger".to_string()];

        let report = app
            .trigger_create_image_batch("corretto17", &services, "4.1.0")
            .unwrap();

        assert_eq!((report.total, report.succeeded, report.failed), (2, 2, 0));
        let seen = invoker.seen.lock().unwrap();
        assert!(seen.iter().all(|(action, _)| action == "OnvioBR - Create AMI"));
        assert!(seen
            .iter()
            .all(|(_, args)| args.get("jdk_version") == Some("corretto17")));

        let history = app.list_history_by_type("create-ami").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].services, services);
        assert_eq!(history[0].succeeded, 2);
    }

    #[test]
    fn promotion_targets_one_service() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = Arc::new(Recording::default());
        let app = app(&dir, invoker.clone());

        let result = app.trigger_promotion("qa", "billing", "4.1.0").unwrap();

        assert!(result.success);
        assert_eq!(result.service, "billing");
        let seen = invoker.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "OnvioBR - Promotion AMI");
        assert_eq!(seen[0].1.get("environment"), Some("qa"));
        assert_eq!(seen[0].1.get("service"), Some("billing"));
        assert_eq!(app.list_history_by_type("promotion-ami").unwrap().len(), 1);
    }

    #[test]
    fn dispatch_single_reads_target_from_params() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, Arc::new(Recording::default()));
        let params = ActionArgs::new().with("service", "billing").with("version", "1");

        let result = app.dispatch_single("Deploy", &params).unwrap();

        assert!(result.success);
        assert_eq!(result.service, "billing");
        assert!(result.error.is_empty());
    }

    #[test]
    fn store_operations_require_an_environment() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, Arc::new(Recording::default()));

        let err = app.save_login(" ", "Main", "alice", "pw").unwrap_err();
        assert!(err.code.is_validation());
        assert!(app.list_logins("qa").unwrap().is_empty());
        assert!(!app.authenticate_with_company_id("", "c1").success);
    }

    #[test]
    fn padded_environment_names_address_the_same_records() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, Arc::new(Recording::default()));

        app.save_login(" qa ", "Main", "alice", "pw").unwrap();
        let id = app.list_logins(" qa ").unwrap()[0].id.clone();
        assert_eq!(app.list_logins("qa").unwrap().len(), 1);

        app.touch_login(" qa ", &id).unwrap();
        assert!(app.list_logins("qa").unwrap()[0].last_used.is_some());

        app.delete_login(" qa ", &id).unwrap();
        assert!(app.list_logins("qa").unwrap().is_empty());

        app.save_company_id("qa ", "Acme", "c-1").unwrap();
        let id = app.list_company_ids("qa").unwrap()[0].id.clone();
        app.delete_company_id(" qa", &id).unwrap();
        assert!(app.list_company_ids("qa").unwrap().is_empty());
    }

    #[test]
    fn check_gh_uses_the_injected_program() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, Arc::new(Recording::default()))
            .with_gh_program(dir.path().join("no-such-gh"));

        let status = app.check_gh();
        assert!(!status.installed);
        assert!(status.error.is_some());
    }
}
