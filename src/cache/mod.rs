// Fetch cache module.
// Maps identifiers to previously retrieved values, in memory or through a durable store.

pub mod durable;
pub mod memory;
pub mod paths;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tracing::info;

use crate::config::{CacheBackend, Config};
use crate::error::{FetchError, Result};
use crate::identifier::Identifier;

pub use durable::DurableCache;
pub use memory::MemoryCache;
pub use store::{FileStore, KeyValueStore, MemoryStore, StoredValue};

/// Identifier-to-value cache consulted before every transport call.
///
/// Neither operation fails: implementations absorb their own storage
/// faults, so a broken cache only ever costs a refetch.
#[async_trait]
pub trait FetchCache<T>: Send + Sync {
    /// Return the stored value, or `None` on a miss.
    async fn get(&self, id: &Identifier) -> Option<T>;

    /// Store a value, overwriting any previous entry.
    async fn set(&self, id: &Identifier, value: T);

    fn stats(&self) -> CacheStats;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Successful writes.
    pub writes: u64,
    /// Reads that failed in the backing store and were served as misses.
    pub degraded_reads: u64,
    /// Writes that failed in the backing store.
    pub degraded_writes: u64,
    /// Entries currently held, when the cache can tell cheaply.
    pub entry_count: Option<u64>,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Build the cache selected by `config`.
///
/// Call once at startup and share the result; every controller built from
/// the same handle sees the same entries.
pub fn build_cache<T>(config: &Config) -> Result<Arc<dyn FetchCache<T>>>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    match config.backend {
        CacheBackend::Memory => {
            info!("using in-memory fetch cache");
            Ok(Arc::new(MemoryCache::<T>::new()))
        }
        CacheBackend::Durable => {
            let dir = config.resolved_store_dir().ok_or_else(|| {
                FetchError::Config("no store directory and no platform cache directory".into())
            })?;
            info!(dir = %dir.display(), "using durable fetch cache");
            Ok(Arc::new(DurableCache::<T, _>::new(FileStore::new(dir))))
        }
    }
}
