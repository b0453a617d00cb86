//! Fan an action out over many targets with bounded concurrency.
//!
//! A batch runs at most `bound` invocations at once. Every target yields
//! exactly one [`DispatchResult`], failures never stop the rest of the
//! batch, and the report is only returned once every invocation finished.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::invoker::{ActionArgs, ActionInvoker};
use crate::output::{BatchReport, DispatchResult};

/// Concurrency bound for a host with `host_parallelism` cores: `floor` when
/// the host has at most that many, otherwise one slot per core.
pub fn bound_for(host_parallelism: usize, floor: usize) -> usize {
    let floor = floor.max(1);
    if host_parallelism <= floor {
        floor
    } else {
        host_parallelism
    }
}

/// [`bound_for`] applied to this machine.
pub fn host_bound(floor: usize) -> usize {
    let host = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    bound_for(host, floor)
}

pub struct Dispatcher {
    invoker: Arc<dyn ActionInvoker>,
    bound: usize,
    target_field: String,
}

impl Dispatcher {
    /// `target_field` names the input that carries each target's value.
    pub fn new(invoker: Arc<dyn ActionInvoker>, bound: usize, target_field: impl Into<String>) -> Self {
        Self {
            invoker,
            bound: bound.max(1),
            target_field: target_field.into(),
        }
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn target_field(&self) -> &str {
        &self.target_field
    }

    /// Run `action` once per target with `shared` inputs plus the target.
    ///
    /// Never fails; an all-failed batch is still a report.
    pub fn dispatch(&self, action: &str, targets: &[String], shared: &ActionArgs) -> BatchReport {
        if targets.is_empty() {
            return BatchReport::new();
        }

        tracing::info!(action, targets = targets.len(), bound = self.bound, "dispatching batch");

        let report = Mutex::new(BatchReport::with_capacity(targets.len()));
        let next = AtomicUsize::new(0);
        // A batch smaller than the bound just leaves slots unused.
        let workers = self.bound.min(targets.len());

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(target) = targets.get(index) else {
                        break;
                    };

                    let result = self.dispatch_single(action, target, shared);
                    report
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .record(result);
                });
            }
        });

        let report = report.into_inner().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(
            action,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "batch finished"
        );
        report
    }

    /// Run `action` for one target. Errors and panics become a failed result.
    pub fn dispatch_single(&self, action: &str, target: &str, shared: &ActionArgs) -> DispatchResult {
        let args = shared.clone().with(self.target_field.as_str(), target);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.invoker.invoke(action, &args)));

        match outcome {
            Ok(Ok(message)) => DispatchResult::succeeded(target, message),
            Ok(Err(err)) => {
                tracing::warn!(action, target, code = err.code.as_str(), "dispatch failed");
                DispatchResult::failed(target, err.message)
            }
            Err(_) => {
                tracing::error!(action, target, "invoker panicked");
                DispatchResult::failed(target, format!("Action '{}' panicked", action))
            }
        }
    }
}
