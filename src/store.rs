//! Async key/value preferences store.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use thiserror::Error;

pub const RECENT_FILES_KEY: &str = "document_recentFiles";
pub const CURRENT_FILES_KEY: &str = "document_currentFiles";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("can't serialize {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[allow(async_fn_in_trait)]
pub trait PersistentStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Preferences kept in a single JSON object on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    cache: Mutex<Option<BTreeMap<String, Value>>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn snapshot(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        if let Some(map) = self.lock().as_ref() {
            return Ok(map.clone());
        }

        let map = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, Value>>(&raw) {
                Ok(map) => map,
                Err(source) => {
                    // A corrupt preferences file must not block startup.
                    tracing::warn!("ignoring unreadable {}: {source}", self.path.display());
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        *self.lock() = Some(map.clone());
        Ok(map)
    }

    async fn flush(&self, map: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(map).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, raw.as_bytes()).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<BTreeMap<String, Value>>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl PersistentStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.snapshot().await?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut map = self.snapshot().await?;
        map.insert(key.to_string(), value);
        self.flush(&map).await?;
        *self.lock() = Some(map);
        Ok(())
    }
}

/// Volatile store for embedders that do not persist sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        match self.values.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl PersistentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.lock().insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn json_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs").join("preferences.json");

        let store = JsonFileStore::new(&path);
        assert_eq!(store.get(RECENT_FILES_KEY).await.unwrap(), None);
        store
            .set(RECENT_FILES_KEY, json!([{"filePath": "/a.md"}]))
            .await
            .unwrap();
        store.set(CURRENT_FILES_KEY, json!([])).await.unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(
            reopened.get(RECENT_FILES_KEY).await.unwrap(),
            Some(json!([{"filePath": "/a.md"}]))
        );
        assert_eq!(reopened.get(CURRENT_FILES_KEY).await.unwrap(), Some(json!([])));
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert_eq!(store.get(RECENT_FILES_KEY).await.unwrap(), None);
        store.set("k", json!(1)).await.unwrap();
        assert_eq!(JsonFileStore::new(&path).get("k").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn memory_store_overwrites() {
        let store = MemoryStore::new();
        store.set("k", json!(1)).await.unwrap();
        store.set("k", json!(2)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
    }
}
