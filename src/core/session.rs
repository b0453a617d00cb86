//! Session token exchange with the environment's security API.
//!
//! Tokens and secrets pass through here but are never logged; only their
//! length is.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::settings::ApiSettings;
use crate::utils::validation;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl AuthResult {
    fn from_result(result: Result<SessionToken>) -> Self {
        match result {
            Ok(token) => Self {
                success: true,
                token: Some(token.token),
                error: None,
                expires_at: token.expires_at,
            },
            Err(e) => Self {
                error: Some(e.message),
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contabil_firm_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: Option<String>,
}

/// Base URL for an environment. `prod` has no environment prefix; the
/// internal host inserts `int.` before the domain.
pub fn base_url(domain: &str, environment: &str, internal: bool) -> String {
    let host = if internal {
        format!("int.{}", domain)
    } else {
        domain.to_string()
    };

    if environment == "prod" {
        format!("https://{}", host)
    } else {
        format!("https://{}.{}", environment, host)
    }
}

/// Environment names become a host label, so only letters, digits and
/// hyphens are accepted.
pub fn require_environment(environment: &str) -> Result<&str> {
    static LABEL: OnceLock<Regex> = OnceLock::new();
    let label = LABEL.get_or_init(|| Regex::new(r"^[A-Za-z0-9-]+$").expect("valid regex"));

    let environment =
        validation::require_non_empty(environment, "environment", "Environment is required")?;
    if !label.is_match(environment) {
        return Err(Error::validation_invalid_argument(
            "environment",
            format!("Invalid environment name '{}'", environment),
        ));
    }
    Ok(environment)
}

pub struct SessionClient {
    client: Client,
    domain: String,
}

impl SessionClient {
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        Self::with_timeout(&settings.domain, settings.timeout())
    }

    pub fn with_timeout(domain: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("batchflow/{}", VERSION))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal_io(e.to_string(), Some("create HTTP client".to_string())))?;

        Ok(Self {
            client,
            domain: domain.to_string(),
        })
    }

    /// Exchange username and secret for a long-lived session token.
    pub fn authenticate_with_credentials(
        &self,
        environment: &str,
        username: &str,
        secret: &str,
    ) -> AuthResult {
        AuthResult::from_result(self.credentials_token(environment, username, secret))
    }

    /// Exchange a company identifier for a session token on the internal host.
    pub fn authenticate_with_company_id(&self, environment: &str, company_id: &str) -> AuthResult {
        AuthResult::from_result(self.company_token(environment, company_id))
    }

    /// Look up the application identifiers bound to a session token.
    pub fn session_info(&self, environment: &str, long_token: &str) -> SessionInfo {
        match self.session_bindings(environment, long_token) {
            Ok(info) => info,
            Err(e) => SessionInfo {
                error: Some(e.message),
                ..SessionInfo::default()
            },
        }
    }

    fn credentials_token(&self, environment: &str, username: &str, secret: &str) -> Result<SessionToken> {
        let environment = require_environment(environment)?;
        validation::require_non_empty(username, "username", "Username is required")?;
        validation::require_non_empty(secret, "password", "Password is required")?;

        let url = format!(
            "{}/api/security/v2/sessions",
            base_url(&self.domain, environment, false)
        );
        tracing::info!(url = %url, "authenticating with credentials");

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&json!({ "username": username, "password": secret }))
            .send()
            .map_err(|e| Error::http_request_failed(url.as_str(), e.to_string()))?;

        let body = read_success_body(&url, response, &[200, 201])?;
        let token = parse_credentials_response(&url, &body)?;
        tracing::info!(token_len = token.token.len(), "session token obtained");
        Ok(token)
    }

    fn company_token(&self, environment: &str, company_id: &str) -> Result<SessionToken> {
        let environment = require_environment(environment)?;
        let company_id =
            validation::require_non_empty(company_id, "companyId", "Company ID is required")?;

        let url = format!(
            "{}/api/internalcompanymapping/v1/sessions/session/{}",
            base_url(&self.domain, environment, true),
            company_id
        );
        tracing::info!(url = %url, "authenticating with company id");

        let response = self
            .client
            .post(&url)
            .header("Accept", "*/*")
            .header("Content-Type", "application/json")
            .send()
            .map_err(|e| Error::http_request_failed(url.as_str(), e.to_string()))?;

        let body = read_success_body(&url, response, &[200])?;
        let token = parse_company_response(&url, &body)?;
        tracing::info!(token_len = token.token.len(), "session token obtained");
        Ok(token)
    }

    fn session_bindings(&self, environment: &str, long_token: &str) -> Result<SessionInfo> {
        let environment = require_environment(environment)?;
        let long_token = validation::require_non_empty(long_token, "token", "Token is required")?;

        let url = format!(
            "{}/api/security/v1/session-bindings",
            base_url(&self.domain, environment, false)
        );
        tracing::info!(url = %url, "fetching session bindings");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("UDSLongToken {}", long_token))
            .header("Accept", "application/json")
            .send()
            .map_err(|e| Error::http_request_failed(url.as_str(), e.to_string()))?;

        let body = read_success_body(&url, response, &[200])?;
        parse_session_bindings(&url, &body)
    }
}

fn read_success_body(url: &str, response: Response, accepted: &[u16]) -> Result<String> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .map_err(|e| Error::http_request_failed(url, e.to_string()))?;

    tracing::debug!(url, status, "response received");

    if !accepted.contains(&status) {
        return Err(Error::http_unexpected_status(url, status, body));
    }
    Ok(body)
}

/// `{"longToken": "...", "expiresAt": "..."}`; `LongToken` is accepted too.
pub fn parse_credentials_response(url: &str, body: &str) -> Result<SessionToken> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::http_invalid_response(url, format!("Could not parse response: {}", e)))?;

    let token = ["longToken", "LongToken"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::http_invalid_response(url, "longToken missing from response"))?;

    let expires_at = value
        .get("expiresAt")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(SessionToken {
        token: token.to_string(),
        expires_at,
    })
}

/// The company endpoint answers with the bare token, sometimes quoted.
pub fn parse_company_response(url: &str, body: &str) -> Result<SessionToken> {
    let token = body.trim().trim_matches('"');
    if token.is_empty() {
        return Err(Error::http_invalid_response(url, "Empty token in response"));
    }
    Ok(SessionToken {
        token: token.to_string(),
        expires_at: None,
    })
}

pub fn parse_session_bindings(url: &str, body: &str) -> Result<SessionInfo> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::http_invalid_response(url, format!("Could not parse response: {}", e)))?;

    let config = value
        .get("ApplicationConfiguration")
        .filter(|v| v.is_object())
        .ok_or_else(|| {
            Error::http_invalid_response(url, "ApplicationConfiguration missing from response")
        })?;

    let field = |key: &str| config.get(key).and_then(Value::as_str).map(str::to_string);

    Ok(SessionInfo {
        success: true,
        error: None,
        company_id: field("CompanyId"),
        contact_id: field("ContactId"),
        contabil_firm_id: field("ContabilFirmId"),
    })
}
