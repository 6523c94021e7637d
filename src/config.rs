//! Runtime configuration loaded from environment variables.
//!
//! Every knob has a safe default; out-of-range values are logged and the
//! default is kept rather than failing startup. Provider credentials are the
//! exception: the binary cannot talk to the clearinghouse without them, so
//! they are required.

use std::time::Duration;

use zeroize::Zeroizing;

use crate::domain::errors::SyncError;

/// Provider protocol version sent in every request.
pub const PROTOCOL_VERSION: &str = "2.1";

/// Tuning for the multi-region synchronization run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Days back from today covered by the default query range.
    pub days_back: u32,
    /// How long the coordinator waits for each region job.
    pub per_region_timeout: Duration,
    /// Worker pool size, independent of the region count.
    pub pool_size: usize,
    /// Provider ceiling on the query range, in days.
    pub max_lookback_days: i64,
    /// Retry budget for transient network failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_base_delay: Duration,
    /// Whether chargebacks are fetched and processed alongside settlements.
    pub chargebacks_enabled: bool,
    /// Region codes to synchronize.
    pub regions: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            days_back: 7,
            per_region_timeout: Duration::from_secs(60),
            pool_size: 5,
            max_lookback_days: 90,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(2000),
            chargebacks_enabled: false,
            regions: Vec::new(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, keeping defaults for
    /// anything missing or out of range.
    pub fn from_env() -> Self {
        let mut config = SyncConfig::default();

        if let Ok(days) = std::env::var("SYNC_DAYS_BACK") {
            match days.parse::<u32>() {
                Ok(value) if (1..=90).contains(&value) => config.days_back = value,
                Ok(value) => {
                    tracing::warn!(
                        "Invalid SYNC_DAYS_BACK value: {} (must be between 1 and 90), using default: {}",
                        value,
                        config.days_back
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse SYNC_DAYS_BACK '{}': {}, using default: {}",
                        days,
                        e,
                        config.days_back
                    );
                }
            }
        }

        if let Ok(timeout) = std::env::var("SYNC_REGION_TIMEOUT_SECONDS") {
            match timeout.parse::<u64>() {
                Ok(value) if (1..=3600).contains(&value) => {
                    config.per_region_timeout = Duration::from_secs(value);
                }
                Ok(value) => {
                    tracing::warn!(
                        "Invalid SYNC_REGION_TIMEOUT_SECONDS value: {} (must be between 1 and 3600), using default: {}",
                        value,
                        config.per_region_timeout.as_secs()
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse SYNC_REGION_TIMEOUT_SECONDS '{}': {}, using default: {}",
                        timeout,
                        e,
                        config.per_region_timeout.as_secs()
                    );
                }
            }
        }

        if let Ok(pool) = std::env::var("SYNC_POOL_SIZE") {
            match pool.parse::<usize>() {
                Ok(value) if (1..=64).contains(&value) => config.pool_size = value,
                Ok(value) => {
                    tracing::warn!(
                        "Invalid SYNC_POOL_SIZE value: {} (must be between 1 and 64), using default: {}",
                        value,
                        config.pool_size
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse SYNC_POOL_SIZE '{}': {}, using default: {}",
                        pool,
                        e,
                        config.pool_size
                    );
                }
            }
        }

        if let Ok(lookback) = std::env::var("SYNC_MAX_LOOKBACK_DAYS") {
            match lookback.parse::<i64>() {
                Ok(value) if (1..=365).contains(&value) => config.max_lookback_days = value,
                Ok(value) => {
                    tracing::warn!(
                        "Invalid SYNC_MAX_LOOKBACK_DAYS value: {} (must be between 1 and 365), using default: {}",
                        value,
                        config.max_lookback_days
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse SYNC_MAX_LOOKBACK_DAYS '{}': {}, using default: {}",
                        lookback,
                        e,
                        config.max_lookback_days
                    );
                }
            }
        }

        if let Ok(retries) = std::env::var("SYNC_MAX_RETRIES") {
            match retries.parse::<u32>() {
                Ok(value) if value <= 10 => config.max_retries = value,
                Ok(value) => {
                    tracing::warn!(
                        "Invalid SYNC_MAX_RETRIES value: {} (must be at most 10), using default: {}",
                        value,
                        config.max_retries
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse SYNC_MAX_RETRIES '{}': {}, using default: {}",
                        retries,
                        e,
                        config.max_retries
                    );
                }
            }
        }

        if let Ok(delay) = std::env::var("SYNC_RETRY_BASE_DELAY_MS") {
            match delay.parse::<u64>() {
                Ok(value) if (100..=60_000).contains(&value) => {
                    config.retry_base_delay = Duration::from_millis(value);
                }
                Ok(value) => {
                    tracing::warn!(
                        "Invalid SYNC_RETRY_BASE_DELAY_MS value: {} (must be between 100 and 60000), using default: {}",
                        value,
                        config.retry_base_delay.as_millis()
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse SYNC_RETRY_BASE_DELAY_MS '{}': {}, using default: {}",
                        delay,
                        e,
                        config.retry_base_delay.as_millis()
                    );
                }
            }
        }

        if let Ok(enabled) = std::env::var("SYNC_CHARGEBACKS_ENABLED") {
            config.chargebacks_enabled = enabled.to_lowercase() == "true" || enabled == "1";
        }

        if let Ok(regions) = std::env::var("SYNC_REGIONS") {
            config.regions = regions
                .split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect();
        }

        config
    }
}

/// Connection details and credentials for the payment clearinghouse.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Base URL of the provider API.
    pub api_url: String,
    pub username: String,
    pub password: Zeroizing<String>,
    /// Organization id assigned by the provider.
    pub org_id: i64,
}

impl ProviderConfig {
    /// Loads provider settings; missing credentials are a startup error.
    pub fn from_env() -> Result<Self, SyncError> {
        let api_url = std::env::var("PROVIDER_API_URL")
            .map_err(|_| SyncError::Validation("PROVIDER_API_URL is not set".to_string()))?;

        let username = std::env::var("PROVIDER_USERNAME")
            .map_err(|_| SyncError::Validation("PROVIDER_USERNAME is not set".to_string()))?;

        let password = std::env::var("PROVIDER_PASSWORD")
            .map_err(|_| SyncError::Validation("PROVIDER_PASSWORD is not set".to_string()))?;

        let org_id = std::env::var("PROVIDER_ORG_ID")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(1);

        Ok(Self {
            api_url,
            username,
            password: Zeroizing::new(password),
            org_id,
        })
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("org_id", &self.org_id)
            .finish()
    }
}

/// Local datastore configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/rendix.db".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/rendix.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Self {
            url,
            max_connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.days_back, 7);
        assert_eq!(config.per_region_timeout, Duration::from_secs(60));
        assert_eq!(config.pool_size, 5);
        assert_eq!(config.max_lookback_days, 90);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_millis(2000));
        assert!(!config.chargebacks_enabled);
    }

    #[test]
    fn test_out_of_range_values_keep_defaults() {
        std::env::set_var("SYNC_REGION_TIMEOUT_SECONDS", "0");
        std::env::set_var("SYNC_POOL_SIZE", "500");
        std::env::set_var("SYNC_MAX_LOOKBACK_DAYS", "1000");
        std::env::set_var("SYNC_MAX_RETRIES", "99");
        std::env::set_var("SYNC_RETRY_BASE_DELAY_MS", "1");

        let config = SyncConfig::from_env();

        assert_eq!(config.per_region_timeout, Duration::from_secs(60));
        assert_eq!(config.pool_size, 5);
        assert_eq!(config.max_lookback_days, 90);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_millis(2000));

        std::env::remove_var("SYNC_REGION_TIMEOUT_SECONDS");
        std::env::remove_var("SYNC_POOL_SIZE");
        std::env::remove_var("SYNC_MAX_LOOKBACK_DAYS");
        std::env::remove_var("SYNC_MAX_RETRIES");
        std::env::remove_var("SYNC_RETRY_BASE_DELAY_MS");
    }

    #[test]
    fn test_database_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, "sqlite://data/rendix.db");
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_provider_debug_redacts_password() {
        let config = ProviderConfig {
            api_url: "https://provider.example/api".to_string(),
            username: "org-user".to_string(),
            password: Zeroizing::new("secret".to_string()),
            org_id: 7,
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("REDACTED"));
    }
}
