// Transport module.
// Abstract asynchronous retrieval of a payload for an identifier.

pub mod http;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::identifier::Identifier;

pub use http::HttpTransport;

/// Asynchronous, fallible retrieval of a payload for an identifier.
///
/// Implementations report a non-ok response the same way as a network
/// failure: an `Err` whose [`reason`](crate::FetchError::reason) is shown
/// to the consumer.
#[async_trait]
pub trait Transport<T>: Send + Sync {
    async fn request(&self, identifier: &Identifier, options: &RequestOptions) -> Result<T>;
}

/// Per-request options passed through to the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Extra headers, sent in order.
    pub headers: Vec<(String, String)>,
    /// Overrides the transport's default timeout.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
