//! Preferences: flat key/value state persisted as a single JSON document.
//!
//! Two backends:
//!   - `File`: the document lives at a path and is rewritten atomically
//!     (temp file + rename) after every mutation.
//!   - `Memory`: nothing touches disk. Used for tests and throwaway sessions.
//!
//! Keys are namespaced by the caller (`read_notifications_<email>`,
//! `pending_navigation`). Values are arbitrary JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::errors::AppError;

pub type Document = BTreeMap<String, Value>;

enum Backend {
    Memory,
    File { path: PathBuf },
}

pub struct Preferences {
    backend: Backend,
    /// `None` until first access; the file is read lazily.
    doc: Mutex<Option<Document>>,
}

impl Preferences {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::File { path: path.into() },
            doc: Mutex::new(None),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory,
            doc: Mutex::new(Some(Document::new())),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::File { path } => Some(path),
            Backend::Memory => None,
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        self.with_doc(|doc| doc.get(key).cloned())?
            .map(serde_json::from_value)
            .transpose()
            .map_err(AppError::from)
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let value = serde_json::to_value(value)?;
        self.update(|doc| {
            doc.insert(key.to_string(), value);
            true
        })
    }

    /// Remove a key. Returns the previous value, if any.
    pub fn take<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let mut removed = None;
        self.update(|doc| {
            removed = doc.remove(key);
            removed.is_some()
        })?;
        removed
            .map(serde_json::from_value)
            .transpose()
            .map_err(AppError::from)
    }

    /// Read-modify-write under the lock. `f` returns whether anything changed;
    /// the document is only flushed when it did.
    pub fn update<F>(&self, f: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut Document) -> bool,
    {
        let mut guard = self
            .doc
            .lock()
            .map_err(|_| AppError::Store("preferences lock poisoned".into()))?;
        let doc = self.loaded(&mut guard)?;
        if f(doc) {
            self.flush(doc)?;
        }
        Ok(())
    }

    fn with_doc<R>(&self, f: impl FnOnce(&Document) -> R) -> Result<R, AppError> {
        let mut guard = self
            .doc
            .lock()
            .map_err(|_| AppError::Store("preferences lock poisoned".into()))?;
        let doc = self.loaded(&mut guard)?;
        Ok(f(doc))
    }

    fn loaded<'a>(&self, slot: &'a mut Option<Document>) -> Result<&'a mut Document, AppError> {
        if slot.is_none() {
            *slot = Some(self.read_from_disk()?);
        }
        Ok(slot.get_or_insert_with(Document::new))
    }

    fn read_from_disk(&self) -> Result<Document, AppError> {
        let Backend::File { path } = &self.backend else {
            return Ok(Document::new());
        };

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no preferences file yet, starting empty");
                return Ok(Document::new());
            }
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Document::new());
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "preferences file is corrupt");
            AppError::Store(format!("corrupt preferences file {}: {}", path.display(), e))
        })
    }

    fn flush(&self, doc: &Document) -> Result<(), AppError> {
        let Backend::File { path } = &self.backend else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(doc)?)?;
        std::fs::rename(&tmp, path)?;
        tracing::trace!(path = %path.display(), keys = doc.len(), "preferences flushed");
        Ok(())
    }
}
