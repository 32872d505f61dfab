//! Persistent key-value storage used for scheduling history.
//!
//! The scheduler only needs get/set/remove/clear by key, so any medium that
//! can provide those works. Two backends ship here: [`MemoryStore`] for
//! tests and ephemeral hosts, and [`JsonFileStore`] which keeps every key in a
//! single JSON object on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::StoreError;

/// Minimal key-value contract for scheduling persistence.
pub trait KvStore: Send + Sync {
    /// Fetch the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key` if present.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// All entries whose key starts with `prefix`, ordered by key.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;

    /// Remove every key.
    fn clear(&self) -> Result<(), StoreError>;

    /// Remove every key starting with `prefix`, leaving all others.
    fn clear_prefix(&self, prefix: &str) -> Result<(), StoreError> {
        for (key, _) in self.scan_prefix(prefix)? {
            self.remove(&key)?;
        }
        Ok(())
    }
}

fn lock(entries: &Mutex<BTreeMap<String, String>>) -> MutexGuard<'_, BTreeMap<String, String>> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn scan(entries: &BTreeMap<String, String>, prefix: &str) -> Vec<(String, String)> {
    entries
        .range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

// ── In-memory ─────────────────────────────────────────────────

/// Process-local store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.entries).remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        Ok(scan(&lock(&self.entries), prefix))
    }

    fn clear(&self) -> Result<(), StoreError> {
        lock(&self.entries).clear();
        Ok(())
    }

    fn clear_prefix(&self, prefix: &str) -> Result<(), StoreError> {
        lock(&self.entries).retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }
}

// ── JSON file ─────────────────────────────────────────────────

/// File-backed store.
///
/// The whole map is held in memory and rewritten on every mutation. Writes go
/// to a sibling `.tmp` file first and are renamed into place, so a crash
/// mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open (or create) the store at `path`, loading existing contents.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let entries = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            if json.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&json)?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), keys = entries.len(), "opened json store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Apply `mutate` and write the result; the in-memory map is only
    /// replaced once the file write succeeded.
    fn mutate(&self, mutate: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), StoreError> {
        let mut entries = lock(&self.entries);
        let mut next = entries.clone();
        mutate(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.mutate(|m| {
            m.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.mutate(|m| {
            m.remove(key);
        })
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        Ok(scan(&lock(&self.entries), prefix))
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.mutate(|m| m.clear())
    }

    fn clear_prefix(&self, prefix: &str) -> Result<(), StoreError> {
        self.mutate(|m| m.retain(|k, _| !k.starts_with(prefix)))
    }
}
