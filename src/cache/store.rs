// Key-value stores backing the durable cache.
// Async get/set of JSON values; the file store persists across restarts.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::StoreError;

use super::paths;

/// Async key-value persistence capability.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }
}

/// On-disk envelope for a stored value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredValue {
    /// The unencoded key, checked on read since long keys share no readable filename.
    pub key: String,
    pub value: Value,
    /// When the value was written.
    pub cached_at: DateTime<Utc>,
}

impl StoredValue {
    pub fn new(key: &str, value: Value) -> Self {
        Self {
            key: key.to_string(),
            value,
            cached_at: Utc::now(),
        }
    }
}

/// In-process store, mostly for tests and ephemeral sessions.
///
/// Reads and writes can be switched to fail to exercise degraded paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `set` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `get` calls, failed ones included.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `set` calls, failed ones included.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Peek at a raw entry without counting a read.
    pub fn raw(&self, key: &str) -> Option<Value> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// File-backed store: one JSON file per key under a namespace directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Open the `store_name` namespace under `root`.
    pub fn namespaced(root: &Path, store_name: &str) -> Self {
        Self::new(paths::store_dir(root, store_name))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the full envelope for a key.
    pub async fn read_entry(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        let path = paths::entry_path(&self.dir, key);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: StoredValue = serde_json::from_str(&contents)?;
        if entry.key != key {
            warn!(key, stored_key = %entry.key, "file store entry belongs to another key");
            return Ok(None);
        }
        Ok(Some(entry))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entry = self.read_entry(key).await?;
        if let Some(entry) = &entry {
            debug!(key, cached_at = %entry.cached_at, "file store read");
        }
        Ok(entry.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;

        let dir = self.dir.clone();
        let path = paths::entry_path(&self.dir, key);
        let json = serde_json::to_vec_pretty(&StoredValue::new(key, value))?;

        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &json))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))??;

        Ok(())
    }
}

/// Write through a uniquely named temp file in `dir`, then rename over `path`.
fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_get_set() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", json!([1, 2])).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!([1, 2])));
        assert_eq!(store.reads(), 2);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_failure_switches() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.set("k", json!(1)).await.is_err());
        assert_eq!(store.raw("k"), None);

        store.set_fail_writes(false);
        store.set("k", json!(1)).await.unwrap();
        store.set_fail_reads(true);
        assert!(matches!(
            store.get("k").await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::namespaced(temp_dir.path(), "posts");

        store
            .set("http://x/posts", json!([{"id": 1, "title": "a"}]))
            .await
            .unwrap();

        let value = store.get("http://x/posts").await.unwrap();
        assert_eq!(value, Some(json!([{"id": 1, "title": "a"}])));

        let entry = store.read_entry("http://x/posts").await.unwrap().unwrap();
        assert_eq!(entry.key, "http://x/posts");
        assert!(entry.cached_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_file_store_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("never-created"));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        FileStore::namespaced(temp_dir.path(), "s")
            .set("k", json!({"a": 1}))
            .await
            .unwrap();

        let reopened = FileStore::namespaced(temp_dir.path(), "s");
        assert_eq!(reopened.get("k").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_file_store_namespaces_are_separate() {
        let temp_dir = TempDir::new().unwrap();
        let a = FileStore::namespaced(temp_dir.path(), "a");
        let b = FileStore::namespaced(temp_dir.path(), "b");

        a.set("k", json!(1)).await.unwrap();
        assert_eq!(b.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_entry_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        std::fs::write(paths::entry_path(temp_dir.path(), "k"), "not json").unwrap();

        assert!(matches!(store.get("k").await, Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn test_file_store_long_url_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::namespaced(temp_dir.path(), "posts");
        let url = format!("https://api.example.com/search?q={}", "term&page=2/".repeat(30));
        assert!(url.len() > 300);

        store.set(&url, json!({"hits": [1, 2, 3]})).await.unwrap();

        assert_eq!(store.get(&url).await.unwrap(), Some(json!({"hits": [1, 2, 3]})));
        assert_eq!(store.get(&format!("{}x", url)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_ignores_entry_for_other_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        let foreign = serde_json::to_string(&StoredValue::new("other", json!(1))).unwrap();
        std::fs::write(paths::entry_path(temp_dir.path(), "k"), foreign).unwrap();

        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_file_store_concurrent_writers_share_a_key() {
        let temp_dir = TempDir::new().unwrap();
        let a = Arc::new(FileStore::namespaced(temp_dir.path(), "shared"));
        let b = Arc::new(FileStore::namespaced(temp_dir.path(), "shared"));

        let mut handles = Vec::new();
        for i in 0..50 {
            for store in [Arc::clone(&a), Arc::clone(&b)] {
                handles.push(tokio::spawn(async move {
                    store.set("k", json!({"n": i})).await?;
                    store.get("k").await
                }));
            }
        }

        for handle in handles {
            let value = handle.await.unwrap().unwrap();
            assert!(value.unwrap()["n"].is_u64());
        }

        let leftovers: Vec<_> = std::fs::read_dir(a.dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name != "k.json")
            .collect();
        assert!(leftovers.is_empty(), "stray files: {:?}", leftovers);
    }
}
