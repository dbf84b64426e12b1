// Durable fetch cache over a key-value store.
// Storage faults degrade to misses or lost persistence, never to consumer errors.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::identifier::Identifier;

use super::store::KeyValueStore;
use super::{CacheStats, FetchCache};

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    degraded_reads: AtomicU64,
    degraded_writes: AtomicU64,
}

/// Fetch cache persisted through a [`KeyValueStore`].
///
/// - A failed or undecodable read is a miss.
/// - A failed write is logged and counted; the caller still gets its value.
pub struct DurableCache<T, S> {
    store: S,
    counters: Counters,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S> DurableCache<T, S>
where
    T: Serialize + DeserializeOwned + Send + 'static,
    S: KeyValueStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            counters: Counters::default(),
            _marker: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn read(&self, id: &Identifier) -> Option<T> {
        let raw = match self.store.get(id.as_str()).await {
            Ok(raw) => raw,
            Err(e) => {
                self.counters.degraded_reads.fetch_add(1, Ordering::Relaxed);
                warn!(identifier = %id, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        let Some(raw) = raw else {
            debug!(identifier = %id, "durable cache miss");
            return None;
        };

        match serde_json::from_value(raw) {
            Ok(value) => {
                debug!(identifier = %id, "durable cache hit");
                Some(value)
            }
            Err(e) => {
                self.counters.degraded_reads.fetch_add(1, Ordering::Relaxed);
                warn!(identifier = %id, error = %e, "cached entry does not decode, treating as miss");
                None
            }
        }
    }

    async fn write(&self, id: &Identifier, value: &T) {
        let raw = match serde_json::to_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                self.counters.degraded_writes.fetch_add(1, Ordering::Relaxed);
                warn!(identifier = %id, error = %e, "value not serializable, not persisted");
                return;
            }
        };

        match self.store.set(id.as_str(), raw).await {
            Ok(()) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.degraded_writes.fetch_add(1, Ordering::Relaxed);
                warn!(identifier = %id, error = %e, "cache write failed, value not persisted");
            }
        }
    }
}

#[async_trait]
impl<T, S> FetchCache<T> for DurableCache<T, S>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    S: KeyValueStore,
{
    async fn get(&self, id: &Identifier) -> Option<T> {
        let value = self.read(id).await;
        let counter = if value.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    async fn set(&self, id: &Identifier, value: T) {
        self.write(id, &value).await;
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            degraded_reads: self.counters.degraded_reads.load(Ordering::Relaxed),
            degraded_writes: self.counters.degraded_writes.load(Ordering::Relaxed),
            entry_count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::{FileStore, MemoryStore};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Post {
        id: u32,
        title: String,
    }

    fn post() -> Post {
        Post {
            id: 1,
            title: "a".to_string(),
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let cache: DurableCache<Post, _> = DurableCache::new(MemoryStore::new());
        let id = Identifier::from("http://x/posts/1");

        assert_eq!(cache.get(&id).await, None);
        cache.set(&id, post()).await;
        assert_eq!(cache.get(&id).await, Some(post()));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.writes), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_read_failure_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let cache: DurableCache<Post, _> = DurableCache::new(Arc::clone(&store));
        let id = Identifier::from("k");
        cache.set(&id, post()).await;

        store.set_fail_reads(true);

        assert_eq!(cache.get(&id).await, None);
        assert_eq!(cache.stats().degraded_reads, 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_absorbed() {
        let store = Arc::new(MemoryStore::new());
        let cache: DurableCache<Post, _> = DurableCache::new(Arc::clone(&store));
        store.set_fail_writes(true);

        cache.set(&Identifier::from("k"), post()).await;

        assert_eq!(store.raw("k"), None);
        assert_eq!(cache.stats().degraded_writes, 1);
        assert_eq!(cache.stats().writes, 0);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        store.set("k", json!("not a post")).await.unwrap();
        let cache: DurableCache<Post, _> = DurableCache::new(Arc::clone(&store));

        assert_eq!(cache.get(&Identifier::from("k")).await, None);
        assert_eq!(cache.stats().degraded_reads, 1);
    }

    #[tokio::test]
    async fn test_empty_list_is_a_hit() {
        let cache: DurableCache<Vec<Post>, _> = DurableCache::new(MemoryStore::new());
        let id = Identifier::from("http://x/none");

        cache.set(&id, Vec::new()).await;

        assert_eq!(cache.get(&id).await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let id = Identifier::from("http://x/posts");

        let first: DurableCache<Vec<Post>, _> =
            DurableCache::new(FileStore::namespaced(temp_dir.path(), "fetch-cache"));
        first.set(&id, vec![post()]).await;
        drop(first);

        let second: DurableCache<Vec<Post>, _> =
            DurableCache::new(FileStore::namespaced(temp_dir.path(), "fetch-cache"));
        assert_eq!(second.get(&id).await, Some(vec![post()]));
    }

    #[tokio::test]
    async fn test_long_url_is_cached_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let url = format!("http://x/posts?{}", "tag=rust&sort=new/".repeat(20));
        assert!(url.len() > 300);
        let id = Identifier::from(url.as_str());

        let cache: DurableCache<Post, _> =
            DurableCache::new(FileStore::namespaced(temp_dir.path(), "fetch-cache"));
        cache.set(&id, post()).await;

        assert_eq!(cache.get(&id).await, Some(post()));
        let stats = cache.stats();
        assert_eq!((stats.writes, stats.degraded_writes), (1, 0));
    }
}
