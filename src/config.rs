// Runtime configuration.
// Selects the cache backend and tunes the HTTP transport, from code or environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::paths::{self, DEFAULT_STORE_NAME};
use crate::error::{FetchError, Result};

pub const ENV_BACKEND: &str = "FETCHSTATE_BACKEND";
pub const ENV_STORE_DIR: &str = "FETCHSTATE_STORE_DIR";
pub const ENV_STORE_NAME: &str = "FETCHSTATE_STORE_NAME";
pub const ENV_TIMEOUT_SECS: &str = "FETCHSTATE_TIMEOUT_SECS";

/// Which fetch cache implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Volatile map, lives as long as the process.
    #[default]
    Memory,
    /// File-backed key-value store, survives restarts.
    Durable,
}

impl std::str::FromStr for CacheBackend {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "durable" => Ok(CacheBackend::Durable),
            other => Err(FetchError::Config(format!(
                "unknown cache backend '{}', expected 'memory' or 'durable'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: CacheBackend,
    /// Namespace of the durable store.
    pub store_name: String,
    /// Root directory for the durable store. Defaults to the platform cache dir.
    pub store_dir: Option<PathBuf>,
    /// Per-request timeout applied by the HTTP transport. None waits forever.
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            store_name: DEFAULT_STORE_NAME.to_string(),
            store_dir: None,
            request_timeout: None,
            user_agent: concat!("fetchstate/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from `FETCHSTATE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(backend) = lookup(ENV_BACKEND) {
            config.backend = backend.parse()?;
        }
        if let Some(dir) = lookup(ENV_STORE_DIR).filter(|d| !d.is_empty()) {
            config.store_dir = Some(PathBuf::from(dir));
        }
        if let Some(name) = lookup(ENV_STORE_NAME) {
            if name.is_empty() {
                return Err(FetchError::Config(format!("{} is empty", ENV_STORE_NAME)));
            }
            config.store_name = name;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            config.request_timeout = Some(parse_timeout(&secs)?);
        }

        Ok(config)
    }

    pub fn with_backend(mut self, backend: CacheBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_store_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.store_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_store_name(mut self, name: impl Into<String>) -> Self {
        self.store_name = name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Directory of the durable store namespace.
    pub fn resolved_store_dir(&self) -> Option<PathBuf> {
        match &self.store_dir {
            Some(root) => Some(paths::store_dir(root, &self.store_name)),
            None => paths::default_store_dir(&self.store_name),
        }
    }
}

/// Parse a positive, possibly fractional, number of seconds.
fn parse_timeout(value: &str) -> Result<Duration> {
    let invalid = |detail: String| {
        FetchError::Config(format!("{} must be positive seconds: {}", ENV_TIMEOUT_SECS, detail))
    };
    let secs = value
        .trim()
        .parse::<f64>()
        .map_err(|e| invalid(e.to_string()))?;
    let timeout = Duration::try_from_secs_f64(secs).map_err(|e| invalid(e.to_string()))?;
    if timeout.is_zero() {
        return Err(invalid(value.to_string()));
    }
    Ok(timeout)
}
