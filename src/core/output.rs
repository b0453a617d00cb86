//! Result types returned to front-end callers.

use serde::{Deserialize, Serialize};

// ============================================================================
// Dispatch Results
// ============================================================================

/// Outcome of one action for one target.
///
/// Exactly one of `message` (on success) and `error` (on failure) is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub service: String,
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl DispatchResult {
    pub fn succeeded(target: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            service: target.into(),
            success: true,
            message: if message.trim().is_empty() {
                "Action triggered".to_string()
            } else {
                message
            },
            error: String::new(),
        }
    }

    pub fn failed(target: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            service: target.into(),
            success: false,
            message: String::new(),
            error: if error.trim().is_empty() {
                "unknown error".to_string()
            } else {
                error
            },
        }
    }

    pub fn target(&self) -> &str {
        &self.service
    }
}

// ============================================================================
// Batch Reports
// ============================================================================

/// Aggregate of a batch dispatch.
///
/// `total` is the number of targets, `succeeded + failed == total`, and
/// `results` holds one entry per target in completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<DispatchResult>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
            results: Vec::with_capacity(total),
        }
    }

    pub fn record(&mut self, result: DispatchResult) {
        if result.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.succeeded == self.total
    }

    pub fn result_for(&self, target: &str) -> Option<&DispatchResult> {
        self.results.iter().find(|r| r.service == target)
    }
}
