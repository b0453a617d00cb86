//! Saved logins and company identifiers, partitioned by environment.
//!
//! Environments are free-form names and are created on first write. Within
//! an environment a username appears at most once among logins, and an
//! identifier value at most once among company identifiers; saves upsert on
//! those keys.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::obscure;
use crate::paths;
use crate::permissions::FileVisibility;
use crate::store::JsonStore;
use crate::utils::validation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedLogin {
    pub id: String,
    pub name: String,
    pub username: String,
    /// Obscured at rest, plain in values returned by [`CredentialStore::list_logins`].
    pub password: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCompanyId {
    pub id: String,
    pub name: String,
    pub company_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentCredentials {
    #[serde(default)]
    pub logins: Vec<SavedLogin>,
    #[serde(default)]
    pub company_ids: Vec<SavedCompanyId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialsDocument {
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentCredentials>,
}

impl CredentialsDocument {
    fn environment(&self, env: &str) -> Option<&EnvironmentCredentials> {
        self.environments.get(env)
    }

    fn environment_mut(&mut self, env: &str) -> &mut EnvironmentCredentials {
        self.environments.entry(env.to_string()).or_default()
    }
}

pub struct CredentialStore {
    store: JsonStore<CredentialsDocument>,
}

impl CredentialStore {
    /// Store backed by `path`. The file is always written owner-only.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonStore::new("credentials", path, FileVisibility::Private),
        }
    }

    /// Store at the default per-user location.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(paths::credentials_json()?))
    }

    pub fn document(&self) -> &JsonStore<CredentialsDocument> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Logins
    // ------------------------------------------------------------------

    /// Logins saved for `env`, with secrets decoded.
    pub fn list_logins(&self, env: &str) -> Result<Vec<SavedLogin>> {
        let doc = self.store.load()?;
        let logins = doc
            .environment(env)
            .map(|creds| {
                creds
                    .logins
                    .iter()
                    .cloned()
                    .map(|mut login| {
                        login.password = obscure::decode(&login.password);
                        login
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(logins)
    }

    /// Insert a login, or update the one already saved under `username`.
    ///
    /// An update replaces name and secret and marks the login as used now;
    /// id and creation time are kept.
    pub fn save_login(&self, env: &str, name: &str, username: &str, secret: &str) -> Result<()> {
        let username = validation::require_non_empty(username, "username", "Username is required")?;
        let now = Utc::now();
        let encoded = obscure::encode(secret);

        self.store.update(|doc| {
            let creds = doc.environment_mut(env);
            match creds.logins.iter_mut().find(|l| l.username == username) {
                Some(existing) => {
                    existing.name = name.to_string();
                    existing.password = encoded;
                    existing.last_used = Some(now);
                }
                None => creds.logins.push(SavedLogin {
                    id: new_id("login"),
                    name: name.to_string(),
                    username: username.to_string(),
                    password: encoded,
                    created_at: now,
                    last_used: None,
                }),
            }
            true
        })?;

        tracing::info!(environment = env, "saved login");
        Ok(())
    }

    /// Remove a login. Unknown environments or ids are a no-op.
    pub fn delete_login(&self, env: &str, id: &str) -> Result<()> {
        self.store.update(|doc| {
            let Some(creds) = doc.environments.get_mut(env) else {
                return false;
            };
            let before = creds.logins.len();
            creds.logins.retain(|l| l.id != id);
            creds.logins.len() != before
        })?;
        Ok(())
    }

    /// Mark a login as used now without touching anything else.
    pub fn touch_login(&self, env: &str, id: &str) -> Result<()> {
        let now = Utc::now();
        self.store.update(|doc| {
            let Some(login) = doc
                .environments
                .get_mut(env)
                .and_then(|creds| creds.logins.iter_mut().find(|l| l.id == id))
            else {
                return false;
            };
            login.last_used = Some(now);
            true
        })?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Company identifiers
    // ------------------------------------------------------------------

    pub fn list_company_ids(&self, env: &str) -> Result<Vec<SavedCompanyId>> {
        let doc = self.store.load()?;
        Ok(doc
            .environment(env)
            .map(|creds| creds.company_ids.clone())
            .unwrap_or_default())
    }

    /// Insert a company identifier, or rename and mark used the one already
    /// saved with the same value.
    pub fn save_company_id(&self, env: &str, name: &str, company_id: &str) -> Result<()> {
        let company_id =
            validation::require_non_empty(company_id, "companyId", "Company ID is required")?;
        let now = Utc::now();

        self.store.update(|doc| {
            let creds = doc.environment_mut(env);
            match creds
                .company_ids
                .iter_mut()
                .find(|c| c.company_id == company_id)
            {
                Some(existing) => {
                    existing.name = name.to_string();
                    existing.last_used = Some(now);
                }
                None => creds.company_ids.push(SavedCompanyId {
                    id: new_id("company"),
                    name: name.to_string(),
                    company_id: company_id.to_string(),
                    created_at: now,
                    last_used: None,
                }),
            }
            true
        })?;

        tracing::info!(environment = env, "saved company id");
        Ok(())
    }

    pub fn delete_company_id(&self, env: &str, id: &str) -> Result<()> {
        self.store.update(|doc| {
            let Some(creds) = doc.environments.get_mut(env) else {
                return false;
            };
            let before = creds.company_ids.len();
            creds.company_ids.retain(|c| c.id != id);
            creds.company_ids.len() != before
        })?;
        Ok(())
    }

    pub fn touch_company_id(&self, env: &str, id: &str) -> Result<()> {
        let now = Utc::now();
        self.store.update(|doc| {
            let Some(entry) = doc
                .environments
                .get_mut(env)
                .and_then(|creds| creds.company_ids.iter_mut().find(|c| c.id == id))
            else {
                return false;
            };
            entry.last_used = Some(now);
            true
        })?;
        Ok(())
    }
}

fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}
