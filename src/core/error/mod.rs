use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ValidationMissingArgument,
    ValidationInvalidArgument,
    ValidationInvalidJson,

    InvocationFailed,
    InvocationTimeout,
    InvocationSpawnFailed,

    PersistenceReadFailed,
    PersistenceWriteFailed,

    HttpRequestFailed,
    HttpUnexpectedStatus,
    HttpInvalidResponse,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",
            ErrorCode::ValidationInvalidJson => "validation.invalid_json",

            ErrorCode::InvocationFailed => "invocation.failed",
            ErrorCode::InvocationTimeout => "invocation.timeout",
            ErrorCode::InvocationSpawnFailed => "invocation.spawn_failed",

            ErrorCode::PersistenceReadFailed => "persistence.read_failed",
            ErrorCode::PersistenceWriteFailed => "persistence.write_failed",

            ErrorCode::HttpRequestFailed => "http.request_failed",
            ErrorCode::HttpUnexpectedStatus => "http.unexpected_status",
            ErrorCode::HttpInvalidResponse => "http.invalid_response",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ErrorCode::ValidationMissingArgument
                | ErrorCode::ValidationInvalidArgument
                | ErrorCode::ValidationInvalidJson
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
}

/// Details attached to a failed external action.
///
/// `output` is the combined stdout/stderr of the process. It can echo
/// parameter values back, so it is never logged above `debug`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationFailedDetails {
    pub action: String,
    pub program: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub output: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationTimeoutDetails {
    pub action: String,
    pub program: String,
    pub timeout_secs: u64,
    pub output: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpDetails {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        let message = format!("Missing required argument: {}", args.join(", "));
        Self::new(
            ErrorCode::ValidationMissingArgument,
            message,
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::ValidationInvalidArgument,
            problem.clone(),
            to_details(InvalidArgumentDetails {
                field: field.into(),
                problem,
            }),
        )
    }

    pub fn validation_invalid_json(err: serde_json::Error, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": err.to_string(),
            "context": context,
        });

        Self::new(ErrorCode::ValidationInvalidJson, "Invalid JSON", details)
    }

    pub fn invocation_failed(details: InvocationFailedDetails) -> Self {
        let message = match details.exit_code {
            Some(code) => format!(
                "Action '{}' exited with status {}: {}",
                details.action,
                code,
                details.output.trim()
            ),
            None => format!(
                "Action '{}' terminated abnormally: {}",
                details.action,
                details.output.trim()
            ),
        };
        Self::new(ErrorCode::InvocationFailed, message, to_details(details))
    }

    pub fn invocation_timeout(details: InvocationTimeoutDetails) -> Self {
        let output = details.output.trim();
        let message = if output.is_empty() {
            format!(
                "Action '{}' did not finish within {}s",
                details.action, details.timeout_secs
            )
        } else {
            format!(
                "Action '{}' did not finish within {}s: {}",
                details.action, details.timeout_secs, output
            )
        };
        Self::new(ErrorCode::InvocationTimeout, message, to_details(details))
            .with_hint("Raise invocationTimeoutSecs in settings.json if the action is legitimately slow")
    }

    pub fn invocation_spawn_failed(
        action: impl Into<String>,
        program: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let action = action.into();
        let program = program.into();
        let error = error.into();
        let message = format!("Could not start '{}' for action '{}': {}", program, action, error);
        Self::new(
            ErrorCode::InvocationSpawnFailed,
            message,
            to_details(InvocationFailedDetails {
                action,
                program,
                exit_code: None,
                output: error,
            }),
        )
        .with_hint("Install the GitHub CLI from https://cli.github.com/ or set ghPath in settings.json")
    }

    pub fn persistence_read(path: impl Into<String>, error: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::PersistenceReadFailed,
            format!("Could not read {}", path),
            to_details(PersistenceDetails {
                path,
                error: error.into(),
            }),
        )
    }

    pub fn persistence_write(path: impl Into<String>, error: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::PersistenceWriteFailed,
            format!("Could not write {}", path),
            to_details(PersistenceDetails {
                path,
                error: error.into(),
            }),
        )
    }

    pub fn http_request_failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::HttpRequestFailed,
            format!("Request failed: {}", error),
            to_details(HttpDetails {
                url: url.into(),
                status: None,
                error,
            }),
        )
    }

    pub fn http_unexpected_status(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(
            ErrorCode::HttpUnexpectedStatus,
            format!("HTTP {}: {}", status, body),
            to_details(HttpDetails {
                url: url.into(),
                status: Some(status),
                error: body,
            }),
        )
    }

    pub fn http_invalid_response(url: impl Into<String>, problem: impl Into<String>) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::HttpInvalidResponse,
            problem.clone(),
            to_details(HttpDetails {
                url: url.into(),
                status: None,
                error: problem,
            }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            to_details(InternalIoErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": error.into(),
            "context": context,
        });
        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Nothing in this crate retries automatically; callers that want to
    /// retry must opt in per error.
    pub fn is_retryable(&self) -> bool {
        self.retryable.unwrap_or(false)
    }
}
