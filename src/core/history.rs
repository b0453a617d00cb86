//! Recent dispatch runs, newest first, capped at [`MAX_HISTORY_ENTRIES`].

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::paths;
use crate::permissions::FileVisibility;
use crate::store::JsonStore;

pub const MAX_HISTORY_ENTRIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jdk_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

/// A run to record. Id and timestamp are assigned on insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryEntry {
    #[serde(rename = "type")]
    pub category: String,
    #[serde(default)]
    pub jdk_version: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

impl NewHistoryEntry {
    fn into_entry(self, id: String, timestamp: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry {
            id,
            timestamp,
            category: self.category,
            jdk_version: self.jdk_version,
            environment: self.environment,
            services: self.services,
            version: self.version,
            succeeded: self.succeeded,
            failed: self.failed,
            total: self.total,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryDocument {
    #[serde(default)]
    pub entries: Vec<HistoryEntry>,
}

pub struct HistoryStore {
    store: JsonStore<HistoryDocument>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonStore::new("history", path, FileVisibility::Shared),
        }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(paths::history_json()?))
    }

    pub fn document(&self) -> &JsonStore<HistoryDocument> {
        &self.store
    }

    pub fn list(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.store.load()?.entries)
    }

    /// Entries of one category, still newest first.
    pub fn list_by_category(&self, category: &str) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .store
            .load()?
            .entries
            .into_iter()
            .filter(|e| e.category == category)
            .collect())
    }

    /// Prepend a run and drop whatever falls past the cap.
    pub fn add(&self, entry: NewHistoryEntry) -> Result<HistoryEntry> {
        let recorded = entry.into_entry(Uuid::new_v4().to_string(), Utc::now());
        let inserted = recorded.clone();

        self.store.update(move |doc| {
            doc.entries.insert(0, recorded);
            doc.entries.truncate(MAX_HISTORY_ENTRIES);
            true
        })?;

        tracing::debug!(id = %inserted.id, category = %inserted.category, "recorded history entry");
        Ok(inserted)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.reset()
    }

    /// Remove one entry. Unknown ids leave the log untouched.
    pub fn delete(&self, id: &str) -> Result<()> {
        self.store.update(|doc| {
            let before = doc.entries.len();
            doc.entries.retain(|e| e.id != id);
            doc.entries.len() != before
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn run(category: &str, version: &str) -> NewHistoryEntry {
        NewHistoryEntry {
            category: category.to_string(),
            services: vec!["billing".to_string()],
            version: Some(version.to_string()),
            succeeded: 1,
            failed: 0,
            total: 1,
            ..Default::default()
        }
    }

    #[test]
    fn add_keeps_ten_newest_first() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));

        for i in 0..11 {
            store.add(run("create-ami", &format!("1.0.{}", i))).unwrap();
        }

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(entries[0].version.as_deref(), Some("1.0.10"));
        assert_eq!(entries[9].version.as_deref(), Some("1.0.1"));
        assert!(entries.iter().all(|e| e.version.as_deref() != Some("1.0.0")));
    }

    #[test]
    fn list_by_category_preserves_order() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));

        store.add(run("create-ami", "1")).unwrap();
        store.add(run("promotion-ami", "2")).unwrap();
        store.add(run("create-ami", "3")).unwrap();

        let creates: Vec<_> = store
            .list_by_category("create-ami")
            .unwrap()
            .into_iter()
            .filter_map(|e| e.version)
            .collect();
        assert_eq!(creates, vec!["3".to_string(), "1".to_string()]);
        assert!(store.list_by_category("unknown").unwrap().is_empty());
    }

    #[test]
    fn delete_and_clear() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));

        let first = store.add(run("create-ami", "1")).unwrap();
        store.add(run("create-ami", "2")).unwrap();

        store.delete(&first.id).unwrap();
        store.delete("no-such-id").unwrap();
        assert_eq!(store.list().unwrap().len(), 1);

        store.clear().unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(HistoryStore::new(dir.path().join("history.json"))
            .list()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn entries_use_wire_field_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = HistoryStore::new(&path);

        store
            .add(NewHistoryEntry {
                category: "create-ami".to_string(),
                jdk_version: Some("corretto11".to_string()),
                ..run("create-ami", "2.3.0")
            })
            .unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"type\": \"create-ami\""));
        assert!(raw.contains("\"jdkVersion\": \"corretto11\""));
        assert!(!raw.contains("environment"));
    }

    #[test]
    fn corrupt_history_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "[[[").unwrap();

        let store = HistoryStore::new(&path);
        assert!(store.list().unwrap().is_empty());

        store.add(run("create-ami", "1")).unwrap();
        assert_eq!(HistoryStore::new(&path).list().unwrap().len(), 1);
    }
}
