//! Per-region and consolidated results of a synchronization run.

use serde::Serialize;

/// Outcome of one region's sync job. A job always resolves to one of these,
/// never to an error that could reach the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct RegionSyncResult {
    pub region_code: String,
    pub success: bool,
    pub settlements_fetched: usize,
    pub chargebacks_fetched: usize,
    pub records_updated: usize,
    pub chargebacks_processed: usize,
    pub orphan_transactions: usize,
    pub error_message: Option<String>,
}

impl RegionSyncResult {
    pub fn new(region_code: impl Into<String>) -> Self {
        Self {
            region_code: region_code.into(),
            success: false,
            settlements_fetched: 0,
            chargebacks_fetched: 0,
            records_updated: 0,
            chargebacks_processed: 0,
            orphan_transactions: 0,
            error_message: None,
        }
    }

    pub fn failure(region_code: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::new(region_code);
        result.error_message = Some(message.into());
        result
    }
}

/// Accumulator over all region results. Totals are commutative sums, so the
/// order in which jobs settle does not affect the consolidated outcome.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidatedSyncResult {
    pub regions_succeeded: usize,
    pub regions_failed: usize,
    pub total_settlements: usize,
    pub total_chargebacks: usize,
    pub total_records_updated: usize,
    pub total_chargebacks_processed: usize,
    pub total_orphans: usize,
    pub results: Vec<RegionSyncResult>,
}

impl ConsolidatedSyncResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one region result into the totals.
    pub fn absorb(&mut self, result: RegionSyncResult) {
        if result.success {
            self.regions_succeeded += 1;
        } else {
            self.regions_failed += 1;
        }
        self.total_settlements += result.settlements_fetched;
        self.total_chargebacks += result.chargebacks_fetched;
        self.total_records_updated += result.records_updated;
        self.total_chargebacks_processed += result.chargebacks_processed;
        self.total_orphans += result.orphan_transactions;
        self.results.push(result);
    }

    pub fn regions_total(&self) -> usize {
        self.regions_succeeded + self.regions_failed
    }

    pub fn region(&self, region_code: &str) -> Option<&RegionSyncResult> {
        self.results.iter().find(|r| r.region_code == region_code)
    }
}
