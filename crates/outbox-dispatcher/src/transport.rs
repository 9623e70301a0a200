//! HTTP transport used to deliver queued requests.

use crate::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Response from a delivery attempt.
///
/// Any response counts as delivered; the status is kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one request and waits for its response.
///
/// Implementations return `Err` only when no response was received.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError>;

    async fn post(&self, url: &Url, payload: &str) -> Result<TransportResponse, TransportError>;
}

/// HTTP transport settings.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("sql-outbox/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with its own connection pool.
    pub fn new(config: &HttpTransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client })
    }

    async fn read(response: reqwest::Response) -> Result<TransportResponse, TransportError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "Received response");
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError> {
        let response = self.client.get(url.clone()).send().await?;
        Self::read(response).await
    }

    async fn post(&self, url: &Url, payload: &str) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(url.clone())
            .body(payload.to_string())
            .send()
            .await?;
        Self::read(response).await
    }
}
