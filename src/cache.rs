//! Durable key/value storage for the last committed snapshot.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::Table;
use crate::error::{Result, SyncError};
use crate::model::SyncSnapshot;

/// Key/value persistence used for warm starts and offline fallback.
pub trait CacheStore: Send + Sync {
    fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Returns `None` when nothing was ever stored under `key`.
    fn load(&self, key: &str) -> Result<Option<String>>;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    dir: PathBuf,
}

impl JsonFileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl CacheStore for JsonFileCache {
    fn save(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local store, used when no cache directory is configured.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CacheStore for MemoryCache {
    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }
}

fn save_entry<T: Serialize>(cache: &dyn CacheStore, table: Table, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    cache.save(table.cache_key(), &json)
}

fn load_entry<T: DeserializeOwned>(cache: &dyn CacheStore, table: Table) -> Result<T> {
    let json = cache.load(table.cache_key())?.ok_or(SyncError::CacheMiss)?;
    Ok(serde_json::from_str(&json)?)
}

/// Writes the four collections of `snapshot` under their table keys.
#[instrument(level = "debug", skip_all)]
pub fn persist_snapshot(cache: &dyn CacheStore, snapshot: &SyncSnapshot) -> Result<()> {
    save_entry(cache, Table::Products, &snapshot.products)?;
    save_entry(cache, Table::Repairs, &snapshot.repairs)?;
    save_entry(cache, Table::Maintenance, &snapshot.maintenance)?;
    save_entry(cache, Table::Specs, &snapshot.specs)?;
    debug!(products = snapshot.products.len(), "snapshot persisted");
    Ok(())
}

/// Reads a whole snapshot back. Fails with [`SyncError::CacheMiss`] unless
/// all four keys are present.
#[instrument(level = "debug", skip_all)]
pub fn restore_snapshot(cache: &dyn CacheStore) -> Result<SyncSnapshot> {
    Ok(SyncSnapshot {
        products: load_entry(cache, Table::Products)?,
        repairs: load_entry(cache, Table::Repairs)?,
        maintenance: load_entry(cache, Table::Maintenance)?,
        specs: load_entry(cache, Table::Specs)?,
    })
}
