//! Durable key/value storage for history and preferences.

use crate::error::{Result, StudioError};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// String key/value storage with whole-value writes.
///
/// A `set` either replaces the value entirely or fails; a write that would
/// exceed the backend's quota fails with [`StudioError::StorageQuota`].
pub trait KeyValueStore: Send {
    /// Reads a value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value, replacing any previous one.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Deletes a value. Deleting a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<()>;
}

fn check_quota(key: &str, quota: Option<u64>, others: u64, value: &str) -> Result<()> {
    if let Some(quota) = quota {
        let needed = others + value.len() as u64;
        if needed > quota {
            return Err(StudioError::StorageQuota {
                key: key.to_string(),
                needed,
                quota,
            });
        }
    }
    Ok(())
}

/// In-memory store, optionally with a byte quota over all values.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    quota: Option<u64>,
}

impl MemoryStore {
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects writes pushing total value size past `quota` bytes.
    pub fn with_quota(quota: u64) -> Self {
        Self {
            entries: HashMap::new(),
            quota: Some(quota),
        }
    }

    /// Total bytes held.
    pub fn used_bytes(&self) -> u64 {
        self.entries.values().map(|v| v.len() as u64).sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let others: u64 = self
            .entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len() as u64)
            .sum();
        check_quota(key, self.quota, others, value)?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

const ENTRY_EXTENSION: &str = "json";

/// One file per key inside a data directory.
///
/// Writes go to a temporary file that is renamed over the entry, so readers see
/// either the old value or the new one.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    quota: Option<u64>,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, quota: Option<u64>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, quota })
    }

    /// Directory holding the entries.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StudioError::InvalidRequest(format!(
                "invalid storage key: {key:?}"
            )));
        }
        Ok(self.dir.join(format!("{key}.{ENTRY_EXTENSION}")))
    }

    fn bytes_used_except(&self, path: &Path) -> Result<u64> {
        let mut total = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let entry_path = entry.path();
            let is_entry = entry_path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION);
            if is_entry && entry_path != path {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        if self.quota.is_some() {
            check_quota(key, self.quota, self.bytes_used_except(&path)?, value)?;
        }

        let tmp = path.with_extension(format!("{ENTRY_EXTENSION}.tmp"));
        std::fs::write(&tmp, value)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("theme").unwrap(), None);
        store.set("theme", "light").unwrap();
        assert_eq!(store.get("theme").unwrap().as_deref(), Some("light"));
        store.remove("theme").unwrap();
        store.remove("theme").unwrap();
        assert_eq!(store.get("theme").unwrap(), None);
    }

    #[test]
    fn test_memory_store_quota_counts_other_keys() {
        let mut store = MemoryStore::with_quota(10);
        store.set("a", "12345").unwrap();
        // Replacing a value only counts the new size.
        store.set("a", "1234567890").unwrap();

        let err = store.set("b", "x").unwrap_err();
        assert!(matches!(
            err,
            StudioError::StorageQuota { needed: 11, quota: 10, .. }
        ));
        assert_eq!(store.get("b").unwrap(), None);
        assert_eq!(store.used_bytes(), 10);
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("data"), None).unwrap();

        assert_eq!(store.get("genstudio_history").unwrap(), None);
        store.set("genstudio_history", "[]").unwrap();
        assert_eq!(store.get("genstudio_history").unwrap().as_deref(), Some("[]"));
        assert!(store.dir().join("genstudio_history.json").exists());
        assert!(!store.dir().join("genstudio_history.json.tmp").exists());

        store.remove("genstudio_history").unwrap();
        store.remove("genstudio_history").unwrap();
        assert_eq!(store.get("genstudio_history").unwrap(), None);
    }

    #[test]
    fn test_file_store_quota() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path(), Some(8)).unwrap();

        store.set("theme", "dark").unwrap();
        store.set("history", "1234").unwrap();
        let err = store.set("history", "12345").unwrap_err();
        assert!(err.is_quota());
        // Failed write leaves the previous value intact.
        assert_eq!(store.get("history").unwrap().as_deref(), Some("1234"));
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path(), None).unwrap();
        assert!(matches!(
            store.set("../escape", "x"),
            Err(StudioError::InvalidRequest(_))
        ));
        assert!(store.get("").is_err());
    }
}
