use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::StoreError;

/// `namespace -> key -> value`
type Table = BTreeMap<String, BTreeMap<String, String>>;

/// Namespaced string store. Keys are independent and writes are plain overwrites.
pub trait KvStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, namespace: &str, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&self, namespace: &str, key: &str) -> Result<(), StoreError>;
}

fn lock(table: &Mutex<Table>) -> MutexGuard<'_, Table> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lookup(table: &Table, namespace: &str, key: &str) -> Option<String> {
    table.get(namespace).and_then(|ns| ns.get(key)).cloned()
}

/// Process-local store, used in tests and as the fallback when the state file is unusable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<Table>,
}

impl KvStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lookup(&lock(&self.table), namespace, key))
    }

    fn set(&self, namespace: &str, key: &str, value: String) -> Result<(), StoreError> {
        lock(&self.table)
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        if let Some(ns) = lock(&self.table).get_mut(namespace) {
            ns.remove(key);
        }
        Ok(())
    }
}

/// TOML file with one table per namespace, rewritten on every change.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct TomlFileStore {
    path: PathBuf,
    table: Mutex<Table>,
}

impl TomlFileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let unavailable = |source| StoreError::Unavailable {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(unavailable)?;
        }

        let table = match fs::read_to_string(&path) {
            Ok(text) => toml::from_str::<Table>(&text).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Table::new(),
            Err(e) => return Err(unavailable(e)),
        };

        debug!(path = %path.display(), namespaces = table.len(), "opened state file");
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, table: &Table) -> Result<(), StoreError> {
        let text = toml::to_string(table)?;
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, text)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|source| StoreError::Unavailable {
                path: self.path.clone(),
                source,
            })
    }
}

impl KvStore for TomlFileStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lookup(&lock(&self.table), namespace, key))
    }

    fn set(&self, namespace: &str, key: &str, value: String) -> Result<(), StoreError> {
        let mut table = lock(&self.table);
        let ns = table.entry(namespace.to_string()).or_default();
        if ns.get(key) == Some(&value) {
            return Ok(());
        }
        ns.insert(key.to_string(), value);
        self.persist(&table)
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        let mut table = lock(&self.table);
        let removed = table
            .get_mut(namespace)
            .and_then(|ns| ns.remove(key))
            .is_some();
        if removed {
            self.persist(&table)
        } else {
            Ok(())
        }
    }
}
