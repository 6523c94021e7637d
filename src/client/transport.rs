//! HTTP transport seam for the provider API.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::domain::errors::SyncError;

/// Transport abstraction over the provider's POST+JSON protocol.
///
/// The production implementation is [`HttpTransport`]; tests substitute
/// mocks to script provider behavior without a network.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Posts a JSON body to an endpoint and returns the response body.
    async fn post(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, SyncError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn post(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, SyncError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::Remote(format!("HTTP {}: {}", status, text)));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| SyncError::Remote(format!("malformed response body: {}", e)))
    }
}

/// Timeouts and connection failures are retryable; everything else is not.
fn classify_reqwest_error(e: reqwest::Error) -> SyncError {
    if e.is_timeout() || e.is_connect() {
        SyncError::TransientNetwork(e.to_string())
    } else {
        SyncError::Remote(e.to_string())
    }
}
