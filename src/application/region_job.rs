//! One region's synchronization job.
//!
//! A job always resolves to a `RegionSyncResult`; every error from the
//! client or the engine is absorbed into a failed result so no region can
//! take its siblings down.

use std::sync::Arc;

use tracing::{error, info};

use crate::application::chargebacks::ChargebackProcessor;
use crate::application::reconciliation::ReconciliationEngine;
use crate::client::provider_client::ProviderClient;
use crate::domain::date_range::DateRange;
use crate::domain::sync_result::RegionSyncResult;

pub struct RegionSyncJob {
    client: Arc<ProviderClient>,
    engine: Arc<ReconciliationEngine>,
    chargebacks: Arc<ChargebackProcessor>,
    chargebacks_enabled: bool,
}

impl RegionSyncJob {
    pub fn new(
        client: Arc<ProviderClient>,
        engine: Arc<ReconciliationEngine>,
        chargebacks: Arc<ChargebackProcessor>,
        chargebacks_enabled: bool,
    ) -> Self {
        Self {
            client,
            engine,
            chargebacks,
            chargebacks_enabled,
        }
    }

    /// Fetch, reconcile, and (when enabled) process chargebacks for one
    /// region. Never returns an error and never panics on provider input.
    pub async fn run(&self, region_code: &str, range: &DateRange) -> RegionSyncResult {
        let mut result = RegionSyncResult::new(region_code);

        let settlements = match self.client.fetch_settlements(region_code, range).await {
            Ok(settlements) => settlements,
            Err(e) => {
                error!("Region {}: settlement fetch failed: {}", region_code, e);
                return RegionSyncResult::failure(region_code, e.to_string());
            }
        };
        result.settlements_fetched = settlements.len();

        match self.engine.reconcile(region_code, &settlements).await {
            Ok(outcome) => {
                result.records_updated = outcome.records_updated;
                result.orphan_transactions = outcome.orphan_transaction_ids.len();
            }
            Err(e) => {
                error!("Region {}: reconciliation failed: {}", region_code, e);
                result.error_message = Some(e.to_string());
                return result;
            }
        }

        if self.chargebacks_enabled {
            match self.client.fetch_chargebacks(region_code, range).await {
                Ok(chargebacks) => {
                    result.chargebacks_fetched = chargebacks.len();
                    match self.chargebacks.process(region_code, &chargebacks).await {
                        Ok(outcome) => {
                            result.chargebacks_processed = outcome.chargebacks_processed;
                            result.orphan_transactions += outcome.orphan_transaction_ids.len();
                        }
                        Err(e) => {
                            error!(
                                "Region {}: chargeback processing failed: {}",
                                region_code, e
                            );
                            result.error_message = Some(e.to_string());
                            return result;
                        }
                    }
                }
                Err(e) => {
                    error!("Region {}: chargeback fetch failed: {}", region_code, e);
                    result.error_message = Some(e.to_string());
                    return result;
                }
            }
        }

        result.success = true;
        info!(
            "Region {}: sync complete ({} settlements, {} records updated, {} orphans)",
            region_code,
            result.settlements_fetched,
            result.records_updated,
            result.orphan_transactions
        );
        result
    }
}
