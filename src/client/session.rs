//! Authentication session against the provider.
//!
//! Provider tokens are valid for 24 hours. The manager caches one token and
//! refreshes it on demand, renewing one hour before expiry so a token never
//! goes stale mid-call. The cache lock is held across the refresh request,
//! which coalesces concurrent callers into a single in-flight refresh.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::client::transport::ProviderTransport;
use crate::client::wire::{self, TokenRequest, TokenResponse};
use crate::config::{ProviderConfig, PROTOCOL_VERSION};
use crate::domain::errors::SyncError;

/// Token validity window granted by the provider.
const TOKEN_TTL_HOURS: i64 = 24;

/// Renew this long before the token actually expires.
const SAFETY_MARGIN_HOURS: i64 = 1;

/// A cached provider token with its validity window.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Still usable, accounting for the safety margin.
    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now + Duration::hours(SAFETY_MARGIN_HOURS) < self.expires_at
    }
}

/// Owns the single shared token cache used by all concurrent region jobs.
pub struct AuthSessionManager {
    transport: Arc<dyn ProviderTransport>,
    config: ProviderConfig,
    cache: Mutex<Option<AuthToken>>,
}

impl AuthSessionManager {
    pub fn new(transport: Arc<dyn ProviderTransport>, config: ProviderConfig) -> Self {
        Self {
            transport,
            config,
            cache: Mutex::new(None),
        }
    }

    /// Returns a valid token value, refreshing if the cached one is absent
    /// or within the safety margin of expiry.
    ///
    /// The cache lock is held for the whole refresh, so N concurrent
    /// callers against an empty cache produce exactly one token request;
    /// the rest observe the freshly cached token.
    pub async fn current_token(&self) -> Result<String, SyncError> {
        let mut cache = self.cache.lock().await;

        if let Some(token) = cache.as_ref() {
            if token.is_valid(Utc::now()) {
                debug!("Using cached token, valid until {}", token.expires_at);
                return Ok(token.value.clone());
            }
            info!("Cached token near expiry ({}), refreshing", token.expires_at);
        }

        let token = self.refresh().await?;
        let value = token.value.clone();
        *cache = Some(token);
        Ok(value)
    }

    /// Unconditionally clears the cache; the next caller refreshes.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.lock().await;
        *cache = None;
        debug!("Token cache invalidated");
    }

    /// True if a usable token is currently cached.
    pub async fn has_valid_token(&self) -> bool {
        let cache = self.cache.lock().await;
        cache
            .as_ref()
            .map(|t| t.is_valid(Utc::now()))
            .unwrap_or(false)
    }

    async fn refresh(&self) -> Result<AuthToken, SyncError> {
        info!("Requesting new token from provider");

        let request = TokenRequest {
            version: PROTOCOL_VERSION.to_string(),
            username: self.config.username.clone(),
            password: self.config.password.to_string(),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| SyncError::Auth(format!("failed to encode token request: {}", e)))?;

        let raw = self.transport.post(wire::endpoints::TOKEN, body).await?;
        let response: TokenResponse = serde_json::from_value(raw)
            .map_err(|e| SyncError::Auth(format!("malformed token response: {}", e)))?;

        if !response.is_success() {
            return Err(SyncError::Auth(format!(
                "token request rejected: {} ({})",
                response.response_text, response.response_code
            )));
        }

        let now = Utc::now();
        let token = AuthToken {
            // is_success guarantees presence
            value: response.token.unwrap_or_default(),
            issued_at: now,
            expires_at: now + Duration::hours(TOKEN_TTL_HOURS),
        };
        info!("Token obtained, valid until {}", token.expires_at);
        Ok(token)
    }
}
