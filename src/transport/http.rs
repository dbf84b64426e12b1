// HTTP transport.
// GETs the identifier as a URL and decodes the JSON body.

use async_trait::async_trait;
use reqwest::{
    Client, Response,
    header::{ACCEPT, HeaderMap, HeaderName, HeaderValue},
};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{FetchError, Result};
use crate::identifier::Identifier;

use super::{RequestOptions, Transport};

/// reqwest-backed transport for JSON resources.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::from_config(&Config::default())
    }

    /// Create a transport using the user agent and timeout in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(FetchError::Network)?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Make a GET request, failing on any non-success status.
    pub async fn get(&self, url: &str, options: &RequestOptions) -> Result<Response> {
        let mut request = self.client.get(url);

        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::Other(format!("invalid header name: {}", e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::Other(format!("invalid header value: {}", e)))?;
            request = request.header(name, value);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        debug!(url, "sending request");
        let response = request.send().await.map_err(FetchError::Network)?;
        check_response(response)
    }
}

/// Check response status and convert errors.
fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let reason = status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string());
    info!(url = %response.url(), status = status.as_u16(), %reason, "request failed");

    Err(FetchError::Status {
        status: status.as_u16(),
        reason,
    })
}

#[async_trait]
impl<T> Transport<T> for HttpTransport
where
    T: DeserializeOwned + Send + 'static,
{
    async fn request(&self, identifier: &Identifier, options: &RequestOptions) -> Result<T> {
        let response = self.get(identifier.as_str(), options).await?;
        let bytes = response.bytes().await.map_err(FetchError::Network)?;
        let payload = serde_json::from_slice(&bytes)?;
        debug!(url = %identifier, bytes = bytes.len(), "decoded response");
        Ok(payload)
    }
}
