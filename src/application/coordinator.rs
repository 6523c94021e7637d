//! Fan-out/fan-in coordinator for the multi-region sync run.
//!
//! One task per region, gated by a semaphore of `pool_size` permits so the
//! degree of parallelism stays bounded regardless of how many regions are
//! configured. Each handle is awaited under the per-region timeout; a
//! timeout only stops the coordinator waiting, it does not abort the task,
//! so a slow region's writes still land after the run reports it as failed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::application::region_job::RegionSyncJob;
use crate::domain::date_range::DateRange;
use crate::domain::errors::SyncError;
use crate::domain::sync_result::{ConsolidatedSyncResult, RegionSyncResult};

pub struct MultiRegionCoordinator {
    job: Arc<RegionSyncJob>,
    pool_size: usize,
    per_region_timeout: Duration,
}

impl MultiRegionCoordinator {
    pub fn new(job: Arc<RegionSyncJob>, pool_size: usize, per_region_timeout: Duration) -> Self {
        Self {
            job,
            pool_size,
            per_region_timeout,
        }
    }

    /// Runs one job per region and folds the results. Partial failure is a
    /// normal `Ok` outcome; only an empty region list is fatal.
    pub async fn sync_regions(
        &self,
        regions: &[String],
        range: DateRange,
    ) -> Result<ConsolidatedSyncResult, SyncError> {
        if regions.is_empty() {
            return Err(SyncError::Validation(
                "no regions configured for synchronization".to_string(),
            ));
        }

        info!(
            "Starting sync for {} regions over {} (pool size {})",
            regions.len(),
            range,
            self.pool_size
        );

        let semaphore = Arc::new(Semaphore::new(self.pool_size));
        let mut handles = Vec::with_capacity(regions.len());

        for region in regions {
            let job = self.job.clone();
            let semaphore = semaphore.clone();
            let region = region.clone();
            let region_for_handle = region.clone();

            let handle = tokio::spawn(async move {
                // Closing the semaphore is not part of this design; acquire
                // can only fail if it were, so surface that as a job failure.
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return RegionSyncResult::failure(&region, format!("pool closed: {}", e))
                    }
                };
                job.run(&region, &range).await
            });
            handles.push((region_for_handle, handle));
        }

        let mut consolidated = ConsolidatedSyncResult::new();
        for (region, handle) in handles {
            let result = match timeout(self.per_region_timeout, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => {
                    error!("Region {}: task failed: {}", region, join_err);
                    RegionSyncResult::failure(&region, format!("task failed: {}", join_err))
                }
                Err(_) => {
                    warn!(
                        "Region {}: no result within {} seconds, counting as failed",
                        region,
                        self.per_region_timeout.as_secs()
                    );
                    RegionSyncResult::failure(
                        &region,
                        format!("timeout: exceeded {} seconds", self.per_region_timeout.as_secs()),
                    )
                }
            };
            consolidated.absorb(result);
        }

        info!(
            "Sync finished: {}/{} regions succeeded, {} records updated, {} orphans",
            consolidated.regions_succeeded,
            consolidated.regions_total(),
            consolidated.total_records_updated,
            consolidated.total_orphans
        );

        Ok(consolidated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
            90,
        )
        .unwrap()
    }

    async fn coordinator() -> MultiRegionCoordinator {
        use crate::application::chargebacks::ChargebackProcessor;
        use crate::application::reconciliation::ReconciliationEngine;
        use crate::client::provider_client::{ProviderClient, RetryPolicy};
        use crate::client::session::AuthSessionManager;
        use crate::client::transport::ProviderTransport;
        use crate::config::ProviderConfig;
        use crate::persistence::audit_repository::SqliteSettlementAuditRepository;
        use crate::persistence::collection_repository::SqliteCollectionRepository;
        use crate::persistence::init_database;
        use async_trait::async_trait;
        use zeroize::Zeroizing;

        struct EmptyProvider;

        #[async_trait]
        impl ProviderTransport for EmptyProvider {
            async fn post(
                &self,
                endpoint: &str,
                _body: serde_json::Value,
            ) -> Result<serde_json::Value, SyncError> {
                if endpoint == crate::client::wire::endpoints::TOKEN {
                    return Ok(serde_json::json!({
                        "response_code": "00001",
                        "response_text": "ok",
                        "token": "tok"
                    }));
                }
                Ok(serde_json::json!({
                    "response_code": "05001",
                    "response_text": "ok",
                    "settlements": []
                }))
            }
        }

        let transport = Arc::new(EmptyProvider);
        let config = ProviderConfig {
            api_url: "https://provider.example/api".to_string(),
            username: "user".to_string(),
            password: Zeroizing::new("pass".to_string()),
            org_id: 1,
        };
        let session = Arc::new(AuthSessionManager::new(transport.clone(), config));
        let client = Arc::new(ProviderClient::new(
            transport,
            session,
            1,
            RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(1),
            },
        ));

        let pool = init_database("sqlite::memory:").await.unwrap();
        let collections = Arc::new(SqliteCollectionRepository::new(pool.clone()));
        let audit = Arc::new(SqliteSettlementAuditRepository::new(pool));
        let engine = Arc::new(ReconciliationEngine::new(collections.clone(), audit));
        let chargebacks = Arc::new(ChargebackProcessor::new(collections));
        let job = Arc::new(RegionSyncJob::new(client, engine, chargebacks, false));

        MultiRegionCoordinator::new(job, 5, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_empty_region_list_is_a_validation_error() {
        let coordinator = coordinator().await;
        let err = coordinator.sync_regions(&[], range()).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn test_all_regions_produce_a_result() {
        let coordinator = coordinator().await;
        let regions: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();

        let consolidated = coordinator.sync_regions(&regions, range()).await.unwrap();

        assert_eq!(consolidated.regions_total(), 3);
        assert_eq!(consolidated.regions_succeeded, 3);
        assert!(consolidated.region("B").is_some());
    }

    #[tokio::test]
    async fn test_more_regions_than_pool_permits_still_complete() {
        let coordinator = coordinator().await;
        let regions: Vec<String> = (0..12).map(|i| format!("R{}", i)).collect();

        let consolidated = coordinator.sync_regions(&regions, range()).await.unwrap();

        assert_eq!(consolidated.regions_total(), 12);
        assert_eq!(consolidated.regions_failed, 0);
    }
}
