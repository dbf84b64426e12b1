// Volatile in-process fetch cache.
// One map shared by every controller that holds a clone of the cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::identifier::Identifier;

use super::{CacheStats, FetchCache};

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

/// In-memory cache keyed by identifier.
///
/// Clones share the same map. Construct one per process and hand clones
/// (or an `Arc`) to everything that builds controllers.
#[derive(Debug)]
pub struct MemoryCache<T> {
    entries: Arc<RwLock<HashMap<Identifier, T>>>,
    counters: Arc<Counters>,
}

impl<T> Clone for MemoryCache<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<T> Default for MemoryCache<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
        }
    }
}

impl<T: Clone> MemoryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry. Presence decides a hit, so an empty list counts.
    pub fn get(&self, id: &Identifier) -> Option<T> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let value = entries.get(id).cloned();
        drop(entries);

        if value.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(identifier = %id, "memory cache hit");
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            debug!(identifier = %id, "memory cache miss");
        }
        value
    }

    /// Insert or overwrite an entry.
    pub fn set(&self, id: &Identifier, value: T) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(id.clone(), value);
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            entry_count: Some(self.len() as u64),
            ..CacheStats::default()
        }
    }
}

#[async_trait]
impl<T> FetchCache<T> for MemoryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, id: &Identifier) -> Option<T> {
        MemoryCache::get(self, id)
    }

    async fn set(&self, id: &Identifier, value: T) {
        MemoryCache::set(self, id, value);
    }

    fn stats(&self) -> CacheStats {
        MemoryCache::stats(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_is_none() {
        let cache: MemoryCache<Vec<u32>> = MemoryCache::new();
        assert_eq!(cache.get(&Identifier::from("http://x/posts")), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_set_overwrites() {
        let cache = MemoryCache::new();
        let id = Identifier::from("http://x/posts");

        cache.set(&id, vec![1]);
        cache.set(&id, vec![2, 3]);

        assert_eq!(cache.get(&id), Some(vec![2, 3]));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().writes, 2);
    }

    #[test]
    fn test_empty_value_is_a_hit() {
        let cache: MemoryCache<Vec<u32>> = MemoryCache::new();
        let id = Identifier::from("http://x/empty");

        cache.set(&id, Vec::new());

        assert_eq!(cache.get(&id), Some(Vec::new()));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = MemoryCache::new();
        let other = cache.clone();
        let id = Identifier::from("k");

        cache.set(&id, "v".to_string());

        assert_eq!(other.get(&id), Some("v".to_string()));
        assert_eq!(other.stats().writes, 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers_keep_every_key() {
        let cache: MemoryCache<usize> = MemoryCache::new();
        let mut handles = Vec::new();

        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.set(&Identifier::new(format!("k{}", i)), i);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len(), 16);
        assert_eq!(cache.get(&Identifier::from("k7")), Some(7));
    }
}
