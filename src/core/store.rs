//! Cached, file-backed JSON documents.
//!
//! A [`JsonStore`] owns one document type and one backing file. The document
//! is read from disk at most once per store instance; afterwards every read is
//! served from the cache and every write goes to disk first, then to the cache.
//!
//! Mutations run [`JsonStore::update`], which holds the exclusive lock across
//! load, edit and save so two concurrent mutations cannot lose an update.
//! Callers only ever receive clones of the document.
//!
//! There is no cross-process locking: one process is expected to own a store
//! file at a time.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::permissions::FileVisibility;
use crate::utils::io;

/// A JSON document that can live in a [`JsonStore`].
///
/// `Default` is the empty document used when the file is absent or corrupt.
pub trait Document: Serialize + DeserializeOwned + Default + Clone + Send + Sync {}

impl<T> Document for T where T: Serialize + DeserializeOwned + Default + Clone + Send + Sync {}

pub struct JsonStore<D: Document> {
    label: &'static str,
    path: PathBuf,
    visibility: FileVisibility,
    cache: RwLock<Option<D>>,
}

impl<D: Document> JsonStore<D> {
    pub fn new(label: &'static str, path: impl Into<PathBuf>, visibility: FileVisibility) -> Self {
        Self {
            label,
            path: path.into(),
            visibility,
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn visibility(&self) -> FileVisibility {
        self.visibility
    }

    /// Whether the document has been read into memory yet.
    pub fn is_cached(&self) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Return a copy of the current document, reading the file on first use.
    pub fn load(&self) -> Result<D> {
        {
            let cached = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(doc) = cached.as_ref() {
                return Ok(doc.clone());
            }
        }

        let mut guard = self.write_guard();
        Ok(self.ensure_loaded(&mut guard)?.clone())
    }

    /// Persist `doc` and make it the cached document.
    ///
    /// On a failed write the cache keeps its previous value.
    pub fn save(&self, doc: D) -> Result<()> {
        let mut guard = self.write_guard();
        self.write_through(&mut guard, doc)
    }

    /// Load, edit and save under one exclusive section.
    ///
    /// `edit` returns whether it changed anything; the file is only rewritten
    /// when it did. Returns that same flag.
    pub fn update<F>(&self, edit: F) -> Result<bool>
    where
        F: FnOnce(&mut D) -> bool,
    {
        let mut guard = self.write_guard();
        let mut working = self.ensure_loaded(&mut guard)?.clone();

        if !edit(&mut working) {
            return Ok(false);
        }

        self.write_through(&mut guard, working)?;
        Ok(true)
    }

    /// Replace the document with an empty one.
    pub fn reset(&self) -> Result<()> {
        self.save(D::default())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Option<D>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Double-checked under the exclusive lock so only one caller reads the file.
    fn ensure_loaded<'g>(&self, guard: &'g mut RwLockWriteGuard<'_, Option<D>>) -> Result<&'g D> {
        if guard.is_none() {
            let doc = self.read_from_disk()?;
            **guard = Some(doc);
        }

        guard
            .as_ref()
            .ok_or_else(|| Error::internal_unexpected(format!("{} cache empty after load", self.label)))
    }

    fn read_from_disk(&self) -> Result<D> {
        let Some(content) = io::read_optional_bytes(&self.path)? else {
            tracing::debug!(store = self.label, path = %self.path.display(), "no backing file, starting empty");
            return Ok(D::default());
        };

        match serde_json::from_slice::<D>(&content) {
            Ok(doc) => {
                tracing::debug!(store = self.label, path = %self.path.display(), "loaded document");
                Ok(doc)
            }
            Err(e) => {
                tracing::warn!(
                    store = self.label,
                    path = %self.path.display(),
                    error = %e,
                    "corrupt document discarded, starting empty"
                );
                Ok(D::default())
            }
        }
    }

    fn write_through(&self, guard: &mut RwLockWriteGuard<'_, Option<D>>, doc: D) -> Result<()> {
        let content = serde_json::to_string_pretty(&doc).map_err(|e| {
            Error::internal_json(e.to_string(), Some(format!("serialize {}", self.label)))
        })?;

        io::write_file_atomic(&self.path, &content, self.visibility)?;

        **guard = Some(doc);
        Ok(())
    }
}

impl<D: Document> std::fmt::Debug for JsonStore<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStore")
            .field("label", &self.label)
            .field("path", &self.path)
            .field("visibility", &self.visibility)
            .field("cached", &self.is_cached())
            .finish()
    }
}
