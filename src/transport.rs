//! HTTP transport for the SMRT Link REST surface.
//!
//! The [`TransportClient`] trait is the seam between the engine and the
//! network: one GET, one JSON value, no retries. Retry behavior belongs to
//! the poll scheduler, which simply tries again on its next tick.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::endpoint::RemoteEndpoint;
use crate::error::TransportError;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Performs a single JSON GET against an endpoint-relative path.
///
/// Implementations must be stateless with respect to individual requests so
/// one instance can be shared by every scheduler.
#[async_trait]
pub trait TransportClient: Send + Sync {
    async fn get(&self, endpoint: &RemoteEndpoint, path: &str) -> Result<Value, TransportError>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a builder for configuring the transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl TransportClient for HttpTransport {
    async fn get(&self, endpoint: &RemoteEndpoint, path: &str) -> Result<Value, TransportError> {
        let url = endpoint.url(path);
        debug!(%url, "GET");

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                code: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::InvalidBody(e.to_string())
            }
        })
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug, Default)]
pub struct HttpTransportBuilder {
    timeout: Option<Duration>,
}

impl HttpTransportBuilder {
    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the request timeout in milliseconds.
    pub fn timeout_millis(self, millis: u64) -> Self {
        self.timeout(Duration::from_millis(millis))
    }

    /// Build the transport.
    pub fn build(self) -> Result<HttpTransport, TransportError> {
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(HttpTransport { client, timeout })
    }
}
