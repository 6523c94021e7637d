//! Retrying client for the provider's settlement and chargeback queries.
//!
//! Each fetch follows the same discipline: the validated range is rendered
//! into a date filter, a token is obtained from the shared session, the call
//! runs under the transient-retry budget, and the business response code is
//! interpreted. An invalid-token code invalidates the shared cache and earns
//! exactly one full retry of the call, outside the backoff budget; a second
//! rejection surfaces as an authentication failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::session::AuthSessionManager;
use crate::client::transport::ProviderTransport;
use crate::client::wire::{
    self, codes, ChargebacksRequest, ChargebacksResponse, Credentials, DateFilter,
    SettlementsRequest, SettlementsResponse,
};
use crate::config::PROTOCOL_VERSION;
use crate::domain::chargeback::Chargeback;
use crate::domain::date_range::DateRange;
use crate::domain::errors::SyncError;
use crate::domain::settlement::Settlement;

/// Backoff schedule for transient transport failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retrying after the given 1-based attempt:
    /// `base_delay * 2^(attempt-1)`.
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(2000),
        }
    }
}

/// Provider client shared by all region jobs.
pub struct ProviderClient {
    transport: Arc<dyn ProviderTransport>,
    session: Arc<AuthSessionManager>,
    org_id: i64,
    retry: RetryPolicy,
}

impl ProviderClient {
    pub fn new(
        transport: Arc<dyn ProviderTransport>,
        session: Arc<AuthSessionManager>,
        org_id: i64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            session,
            org_id,
            retry,
        }
    }

    /// Fetches settlements for a region in the range. Never returns a null
    /// payload: an empty list means no settlements in the period.
    pub async fn fetch_settlements(
        &self,
        region: &str,
        range: &DateRange,
    ) -> Result<Vec<Settlement>, SyncError> {
        info!("Fetching settlements for region {} in range {}", region, range);

        let mut token_retried = false;
        loop {
            let response = self.call_settlements(region, range).await?;

            match response.response_code.as_str() {
                codes::SETTLEMENTS_OK => {
                    info!(
                        "Settlements fetched for region {}: {} records",
                        region,
                        response.settlements.len()
                    );
                    return Ok(response.settlements);
                }
                codes::SETTLEMENTS_INVALID_TOKEN => {
                    self.session.invalidate().await;
                    if token_retried {
                        return Err(SyncError::Auth(format!(
                            "token rejected after forced refresh: {}",
                            response.response_text
                        )));
                    }
                    warn!("Provider rejected token, refreshing and retrying once");
                    token_retried = true;
                }
                code => {
                    return Err(SyncError::Remote(format!(
                        "{} ({})",
                        response.response_text, code
                    )));
                }
            }
        }
    }

    /// Fetches chargebacks for a region, same contract as settlements.
    pub async fn fetch_chargebacks(
        &self,
        region: &str,
        range: &DateRange,
    ) -> Result<Vec<Chargeback>, SyncError> {
        info!("Fetching chargebacks for region {} in range {}", region, range);

        let mut token_retried = false;
        loop {
            let response = self.call_chargebacks(region, range).await?;

            match response.response_code.as_str() {
                codes::CHARGEBACKS_OK => {
                    let urgent = response.chargebacks.iter().filter(|c| c.is_urgent()).count();
                    if urgent > 0 {
                        warn!(
                            "{} chargebacks require urgent attention (due in under 2 days)",
                            urgent
                        );
                    }
                    info!(
                        "Chargebacks fetched for region {}: {} records",
                        region,
                        response.chargebacks.len()
                    );
                    return Ok(response.chargebacks);
                }
                codes::CHARGEBACKS_INVALID_TOKEN => {
                    self.session.invalidate().await;
                    if token_retried {
                        return Err(SyncError::Auth(format!(
                            "token rejected after forced refresh: {}",
                            response.response_text
                        )));
                    }
                    warn!("Provider rejected token, refreshing and retrying once");
                    token_retried = true;
                }
                code => {
                    return Err(SyncError::Remote(format!(
                        "{} ({})",
                        response.response_text, code
                    )));
                }
            }
        }
    }

    async fn call_settlements(
        &self,
        region: &str,
        range: &DateRange,
    ) -> Result<SettlementsResponse, SyncError> {
        let request = SettlementsRequest {
            version: PROTOCOL_VERSION.to_string(),
            credentials: self.credentials().await?,
            region: region.to_string(),
            filter: filter_for(range),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| SyncError::Remote(format!("failed to encode request: {}", e)))?;

        let raw = self
            .execute_with_retries(wire::endpoints::SETTLEMENTS, body)
            .await?;
        serde_json::from_value(raw)
            .map_err(|e| SyncError::Remote(format!("malformed settlements response: {}", e)))
    }

    async fn call_chargebacks(
        &self,
        region: &str,
        range: &DateRange,
    ) -> Result<ChargebacksResponse, SyncError> {
        let request = ChargebacksRequest {
            version: PROTOCOL_VERSION.to_string(),
            credentials: self.credentials().await?,
            region: region.to_string(),
            filter: filter_for(range),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| SyncError::Remote(format!("failed to encode request: {}", e)))?;

        let raw = self
            .execute_with_retries(wire::endpoints::CHARGEBACKS, body)
            .await?;
        serde_json::from_value(raw)
            .map_err(|e| SyncError::Remote(format!("malformed chargebacks response: {}", e)))
    }

    async fn credentials(&self) -> Result<Credentials, SyncError> {
        let token = self.session.current_token().await?;
        Ok(Credentials {
            org_id: self.org_id,
            token,
        })
    }

    /// Runs one POST under the transient-retry budget. Transient failures
    /// back off exponentially and escalate to `Remote` once the budget is
    /// spent; everything else propagates immediately.
    async fn execute_with_retries(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, SyncError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!("Attempt {}/{} for {}", attempt, self.retry.max_retries, endpoint);

            match self.transport.post(endpoint, body.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    if attempt >= self.retry.max_retries {
                        return Err(SyncError::Remote(format!(
                            "transient failure persisted after {} attempts: {}",
                            attempt, e
                        )));
                    }
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        "Transient failure on attempt {} for {}, retrying in {:?}: {}",
                        attempt, endpoint, delay, e
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn filter_for(range: &DateRange) -> DateFilter {
    DateFilter {
        date_from: range.from_wire(),
        date_to: range.to_wire(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;
    use zeroize::Zeroizing;

    use crate::config::ProviderConfig;

    /// Transport that always grants tokens and plays back a script of
    /// responses for data endpoints.
    struct ScriptedTransport {
        token_calls: AtomicUsize,
        data_calls: AtomicUsize,
        script: Mutex<VecDeque<Result<serde_json::Value, SyncError>>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<serde_json::Value, SyncError>>) -> Arc<Self> {
            Arc::new(Self {
                token_calls: AtomicUsize::new(0),
                data_calls: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl ProviderTransport for ScriptedTransport {
        async fn post(
            &self,
            endpoint: &str,
            _body: serde_json::Value,
        ) -> Result<serde_json::Value, SyncError> {
            if endpoint == wire::endpoints::TOKEN {
                let n = self.token_calls.fetch_add(1, Ordering::SeqCst);
                return Ok(serde_json::json!({
                    "response_code": "00001",
                    "response_text": "ok",
                    "token": format!("tok-{}", n)
                }));
            }
            self.data_calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| panic!("unscripted call to {}", endpoint))
        }
    }

    fn client(transport: Arc<ScriptedTransport>, max_retries: u32) -> ProviderClient {
        let config = ProviderConfig {
            api_url: "https://provider.example/api".to_string(),
            username: "user".to_string(),
            password: Zeroizing::new("pass".to_string()),
            org_id: 1,
        };
        let session = Arc::new(AuthSessionManager::new(transport.clone(), config));
        ProviderClient::new(
            transport,
            session,
            1,
            RetryPolicy {
                max_retries,
                base_delay: Duration::from_millis(1),
            },
        )
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
            90,
        )
        .unwrap()
    }

    fn ok_settlements(count: usize) -> serde_json::Value {
        let settlements: Vec<_> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "id": 100 + i,
                    "sequence": i,
                    "status": "Deposited",
                    "line_items": []
                })
            })
            .collect();
        serde_json::json!({
            "response_code": "05001",
            "response_text": "settlements returned",
            "settlements": settlements
        })
    }

    #[tokio::test]
    async fn test_success_returns_payload() {
        let transport = ScriptedTransport::new(vec![Ok(ok_settlements(2))]);
        let settlements = client(transport.clone(), 3)
            .fetch_settlements("A", &range())
            .await
            .unwrap();
        assert_eq!(settlements.len(), 2);
        assert_eq!(transport.data_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_payload_is_not_an_error() {
        let transport = ScriptedTransport::new(vec![Ok(serde_json::json!({
            "response_code": "05001",
            "response_text": "settlements returned"
        }))]);
        let settlements = client(transport, 3).fetch_settlements("A", &range()).await.unwrap();
        assert!(settlements.is_empty());
    }

    #[tokio::test]
    async fn test_transient_failures_retry_then_succeed() {
        let transport = ScriptedTransport::new(vec![
            Err(SyncError::TransientNetwork("timeout".into())),
            Err(SyncError::TransientNetwork("connection reset".into())),
            Ok(ok_settlements(1)),
        ]);
        let settlements = client(transport.clone(), 3)
            .fetch_settlements("A", &range())
            .await
            .unwrap();
        assert_eq!(settlements.len(), 1);
        assert_eq!(transport.data_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transient_failures_exhaust_budget_as_remote() {
        let transport = ScriptedTransport::new(vec![
            Err(SyncError::TransientNetwork("timeout".into())),
            Err(SyncError::TransientNetwork("timeout".into())),
            Err(SyncError::TransientNetwork("timeout".into())),
        ]);
        let err = client(transport.clone(), 3)
            .fetch_settlements("A", &range())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Remote(_)));
        // No attempt beyond the budget.
        assert_eq!(transport.data_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_failure_propagates_immediately() {
        let transport = ScriptedTransport::new(vec![Err(SyncError::Remote("HTTP 500".into()))]);
        let err = client(transport.clone(), 3)
            .fetch_settlements("A", &range())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Remote(_)));
        assert_eq!(transport.data_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_token_triggers_one_full_retry() {
        let transport = ScriptedTransport::new(vec![
            Ok(serde_json::json!({
                "response_code": "05002",
                "response_text": "token validation failed"
            })),
            Ok(ok_settlements(1)),
        ]);
        let settlements = client(transport.clone(), 3)
            .fetch_settlements("A", &range())
            .await
            .unwrap();
        assert_eq!(settlements.len(), 1);
        // Invalidation forced a second token request for the retry.
        assert_eq!(transport.token_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_token_twice_surfaces_auth_error() {
        let rejected = serde_json::json!({
            "response_code": "05002",
            "response_text": "token validation failed"
        });
        let transport = ScriptedTransport::new(vec![Ok(rejected.clone()), Ok(rejected)]);
        let err = client(transport, 3).fetch_settlements("A", &range()).await.unwrap_err();
        assert!(matches!(err, SyncError::Auth(_)));
    }

    #[tokio::test]
    async fn test_business_failure_code_carries_provider_message() {
        let transport = ScriptedTransport::new(vec![Ok(serde_json::json!({
            "response_code": "05004",
            "response_text": "date range exceeds the allowed limit"
        }))]);
        let err = client(transport, 3).fetch_settlements("A", &range()).await.unwrap_err();
        match err {
            SyncError::Remote(msg) => {
                assert!(msg.contains("date range exceeds the allowed limit"));
                assert!(msg.contains("05004"));
            }
            other => panic!("expected Remote, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_chargebacks_success() {
        let transport = ScriptedTransport::new(vec![Ok(serde_json::json!({
            "response_code": "06001",
            "response_text": "chargebacks returned",
            "chargebacks": [{
                "id": 7,
                "status": "Pending",
                "external_transaction_id": 555,
                "amount": 120.0
            }]
        }))]);
        let chargebacks = client(transport, 3).fetch_chargebacks("A", &range()).await.unwrap();
        assert_eq!(chargebacks.len(), 1);
        assert_eq!(chargebacks[0].external_transaction_id, Some(555));
    }

    #[tokio::test]
    async fn test_chargeback_invalid_version_is_remote() {
        let transport = ScriptedTransport::new(vec![Ok(serde_json::json!({
            "response_code": "06006",
            "response_text": "invalid protocol version"
        }))]);
        let err = client(transport, 3).fetch_chargebacks("A", &range()).await.unwrap_err();
        assert!(matches!(err, SyncError::Remote(_)));
    }
}
