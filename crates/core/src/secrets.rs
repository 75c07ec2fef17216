//! Local secret storage behind a trait.
//!
//! The token pair and the questionnaire cache are persisted as opaque
//! strings under fixed keys. Platform shells provide their own
//! backing store (keychain, encrypted preferences); this crate ships a
//! file-backed store and an in-memory store for tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

/// Errors from the underlying secret store.
///
/// Distinct from "key absent": readers get `Ok(None)` for missing keys and
/// an error only when the store itself failed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Other(String),
}

/// Key/value store for small secrets and cached blobs.
pub trait SecretStore: Send + Sync {
    /// Read a secret. Absent keys return `Ok(None)`, never an error.
    fn get_secret(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a secret, overwriting any existing value.
    fn set_secret(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a secret. Removing an absent key is a no-op.
    fn delete_secret(&self, key: &str) -> Result<(), StorageError>;
}

/// File-backed secret store: one JSON-string file per key under a directory.
///
/// Writes go through a temp file + rename so a crashed write never leaves a
/// truncated value behind.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are fixed constants in this codebase; sanitize anyway so a
        // hostile key cannot escape the store directory.
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl SecretStore for FileSecretStore {
    fn get_secret(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let value: String = serde_json::from_str(&content)?;
                Ok(Some(value))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    fn set_secret(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string(value)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete_secret(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

/// In-memory secret store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get_secret(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self
            .values
            .lock()
            .map_err(|_| StorageError::Other("secret store lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set_secret(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| StorageError::Other("secret store lock poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_secret(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| StorageError::Other("secret store lock poisoned".to_string()))?;
        values.remove(key);
        Ok(())
    }
}
