// fetchstate: cache-backed, cancellation-aware data fetching.
// A controller resolves an identifier through a shared cache, falling back to a
// transport on a miss, and reports idle/loading/fetched/error to its consumer.

pub mod cache;
pub mod cancel;
pub mod config;
pub mod controller;
pub mod error;
pub mod identifier;
pub mod state;
pub mod transport;

pub use cache::{
    CacheStats, DurableCache, FetchCache, FileStore, KeyValueStore, MemoryCache, MemoryStore,
    build_cache,
};
pub use cancel::CancellationFlag;
pub use config::{CacheBackend, Config};
pub use controller::FetchController;
pub use error::{FetchError, Result, StoreError};
pub use identifier::Identifier;
pub use state::{FetchEvent, FetchState};
pub use transport::{HttpTransport, RequestOptions, Transport};
