// Error types for fetchstate.
// Covers transport failures, key-value store faults, and configuration errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Human-readable reason reported to consumers in the error state.
    ///
    /// For a non-ok response this is the bare status text ("Not Found").
    pub fn reason(&self) -> String {
        match self {
            FetchError::Status { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

/// Faults raised by a key-value store. The durable cache absorbs these.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;
