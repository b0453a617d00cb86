use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use batchflow::credentials::CredentialStore;
use batchflow::history::{HistoryStore, NewHistoryEntry};
use batchflow::invoker::{ActionArgs, ActionInvoker};
use batchflow::settings::Settings;
use batchflow::{App, Error, Result};

/// Fails targets whose name starts with `bad-`, counts overlapping calls.
#[derive(Default)]
struct FakeInvoker {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ActionInvoker for FakeInvoker {
    fn invoke(&self, action: &str, args: &ActionArgs) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let target = args.get("service").unwrap_or_default();
        if target.starts_with("bad-") {
            return Err(Error::internal_unexpected(format!("{} rejected by {}", target, action)));
        }
        Ok(format!("{} started", target))
    }
}

fn open_app(dir: &Path, invoker: Arc<FakeInvoker>) -> App {
    App::new(
        Settings::default(),
        CredentialStore::new(dir.join("credentials.json")),
        HistoryStore::new(dir.join("history.json")),
        invoker,
    )
}

fn names(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}{}", prefix, i)).collect()
}

#[test]
fn batch_counts_always_add_up() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = Arc::new(FakeInvoker::default());
    let app = open_app(dir.path(), invoker.clone());

    let mut targets = names("svc-", 7);
    targets.extend(names("bad-", 3));

    let report = app
        .dispatch_batch("Build", &targets, &ActionArgs::new().with("version", "1.0"))
        .unwrap();

    assert_eq!(report.total, targets.len());
    assert_eq!(report.succeeded + report.failed, report.total);
    assert_eq!(report.failed, 3);
    assert_eq!(report.results.len(), targets.len());

    let reported: HashSet<&str> = report.results.iter().map(|r| r.service.as_str()).collect();
    assert_eq!(reported.len(), targets.len());

    for result in &report.results {
        if result.success {
            assert!(result.error.is_empty());
        } else {
            assert!(!result.error.is_empty());
        }
    }

    let peak = invoker.peak.load(Ordering::SeqCst);
    assert!(peak <= app.concurrency_bound());
}

#[test]
fn empty_batch_is_a_zero_report() {
    let dir = tempfile::tempdir().unwrap();
    let invoker = Arc::new(FakeInvoker::default());
    let app = open_app(dir.path(), invoker.clone());

    let report = app.dispatch_batch("Build", &[], &ActionArgs::new()).unwrap();

    assert_eq!((report.total, report.succeeded, report.failed), (0, 0, 0));
    assert!(report.results.is_empty());
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn saving_a_login_twice_updates_it_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let app = open_app(dir.path(), Arc::new(FakeInvoker::default()));

    app.save_login("qa", "First", "alice", "pw1").unwrap();
    let first = app.list_logins("qa").unwrap().remove(0);

    app.save_login("qa", "Renamed", "alice", "pw2").unwrap();
    let logins = app.list_logins("qa").unwrap();

    assert_eq!(logins.len(), 1);
    assert_eq!(logins[0].name, "Renamed");
    assert_eq!(logins[0].password, "pw2");
    assert_eq!(logins[0].id, first.id);
    assert_eq!(logins[0].created_at, first.created_at);

    // Secrets are obscured on disk.
    let raw = fs::read_to_string(dir.path().join("credentials.json")).unwrap();
    assert!(!raw.contains("\"pw2\""));
}

#[test]
fn secrets_round_trip_through_a_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let secrets = ["", "plain", "with spaces", "ünïcødé", "p@ss:w0rd/=+"];

    {
        let app = open_app(dir.path(), Arc::new(FakeInvoker::default()));
        for (i, secret) in secrets.iter().enumerate() {
            let username = format!("user{}", i);
            app.save_login("prod", "Login", &username, secret).unwrap();
        }
    }

    let app = open_app(dir.path(), Arc::new(FakeInvoker::default()));
    let logins = app.list_logins("prod").unwrap();
    assert_eq!(logins.len(), secrets.len());
    for (i, secret) in secrets.iter().enumerate() {
        let username = format!("user{}", i);
        let login = logins.iter().find(|l| l.username == username).unwrap();
        assert_eq!(login.password, *secret);
    }
}

#[test]
fn history_keeps_the_ten_newest() {
    let dir = tempfile::tempdir().unwrap();
    let app = open_app(dir.path(), Arc::new(FakeInvoker::default()));

    for i in 0..11 {
        app.add_history_entry(NewHistoryEntry {
            category: "create-ami".to_string(),
            version: Some(format!("1.{}", i)),
            total: 1,
            succeeded: 1,
            ..Default::default()
        })
        .unwrap();
    }

    let entries = app.list_history().unwrap();
    assert_eq!(entries.len(), 10);
    assert_eq!(entries[0].version.as_deref(), Some("1.10"));
    assert_eq!(entries[9].version.as_deref(), Some("1.1"));
    assert!(entries.iter().all(|e| e.version.as_deref() != Some("1.0")));

    app.delete_history_entry(&entries[0].id).unwrap();
    assert_eq!(app.list_history().unwrap().len(), 9);

    app.clear_history().unwrap();
    assert!(app.list_history().unwrap().is_empty());
}

#[test]
fn corrupt_store_files_read_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("credentials.json"), "{ not json").unwrap();
    fs::write(dir.path().join("history.json"), "[1, 2").unwrap();

    let app = open_app(dir.path(), Arc::new(FakeInvoker::default()));

    assert!(app.list_logins("qa").unwrap().is_empty());
    assert!(app.list_history().unwrap().is_empty());

    app.save_company_id("qa", "Acme", "c-42").unwrap();
    let ids = app.list_company_ids("qa").unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(ids[0].company_id, "c-42");
}

#[test]
fn concurrent_saves_lose_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let app = open_app(dir.path(), Arc::new(FakeInvoker::default()));

    thread::scope(|scope| {
        for t in 0..4 {
            let app = &app;
            scope.spawn(move || {
                for i in 0..5 {
                    app.save_company_id("qa", "Company", &format!("c-{}-{}", t, i))
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(app.list_company_ids("qa").unwrap().len(), 20);
}

#[test]
fn non_utf8_credentials_file_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("credentials.json"), [0xff, 0xfe, b'{', b'}']).unwrap();

    let app = open_app(dir.path(), Arc::new(FakeInvoker::default()));

    assert!(app.list_logins("qa").unwrap().is_empty());
    app.save_login("qa", "Main", "alice", "pw").unwrap();
    assert_eq!(app.list_logins("qa").unwrap().len(), 1);
}
