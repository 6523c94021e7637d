//! Batch reconciliation of provider settlements against the local ledger.
//!
//! One run does a single bulk ledger lookup over the distinct transaction
//! ids of the batch, stages field updates for the matched rows, commits them
//! in one transaction, and appends an audit row per processed settlement.
//! Transaction ids the ledger does not know are orphans: reported and
//! logged, never an error, and never turned into fabricated rows.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::errors::SyncError;
use crate::domain::settlement::Settlement;
use crate::persistence::audit_repository::SettlementAuditRepository;
use crate::persistence::collection_repository::CollectionRepository;
use crate::persistence::models::{CreateSettlementAudit, SettlementUpdate};

/// What one reconciliation run did.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationOutcome {
    /// Settlements that carried an id and a status and were processed.
    pub settlements_processed: usize,
    /// Ledger rows actually updated.
    pub records_updated: usize,
    /// Distinct transaction ids with no ledger row.
    pub orphan_transaction_ids: Vec<String>,
}

pub struct ReconciliationEngine {
    collections: Arc<dyn CollectionRepository>,
    audit: Arc<dyn SettlementAuditRepository>,
}

impl ReconciliationEngine {
    pub fn new(
        collections: Arc<dyn CollectionRepository>,
        audit: Arc<dyn SettlementAuditRepository>,
    ) -> Self {
        Self { collections, audit }
    }

    /// Reconciles a batch of settlements for one region.
    ///
    /// Deterministic over input order: staged updates are keyed by
    /// transaction id, so the last settlement in the batch that references an
    /// id wins, and reapplying the same batch changes nothing.
    pub async fn reconcile(
        &self,
        region_code: &str,
        settlements: &[Settlement],
    ) -> Result<ReconciliationOutcome, SyncError> {
        let processable: Vec<&Settlement> = settlements
            .iter()
            .filter(|s| {
                if s.is_processable() {
                    true
                } else {
                    warn!(
                        "Skipping settlement without id or status in region {}: {:?}",
                        region_code, s.id
                    );
                    false
                }
            })
            .collect();

        let ids = distinct_transaction_ids(&processable);
        debug!(
            "Region {}: {} settlements, {} distinct transaction ids",
            region_code,
            processable.len(),
            ids.len()
        );

        let id_list: Vec<String> = ids.iter().cloned().collect();
        let known: BTreeSet<String> = self
            .collections
            .find_by_transaction_ids(&id_list)
            .await?
            .into_iter()
            .map(|r| r.external_transaction_id)
            .collect();

        let mut staged: BTreeMap<String, SettlementUpdate> = BTreeMap::new();
        let mut orphans: BTreeSet<String> = BTreeSet::new();
        let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();

        for settlement in &processable {
            // is_processable guarantees both
            let settlement_id = match settlement.id {
                Some(id) => id,
                None => continue,
            };
            let status = settlement.status.as_deref().unwrap_or_default().trim();
            *status_counts.entry(status.to_string()).or_insert(0) += 1;

            for item in &settlement.line_items {
                let txn_id = match item.external_transaction_id {
                    Some(id) => id.to_string(),
                    None => {
                        warn!(
                            "Settlement {} has a line item without a transaction id",
                            settlement_id
                        );
                        continue;
                    }
                };

                if !known.contains(&txn_id) {
                    orphans.insert(txn_id);
                    continue;
                }

                staged.insert(
                    txn_id.clone(),
                    SettlementUpdate {
                        external_transaction_id: txn_id,
                        settlement_id,
                        settlement_sequence: settlement.sequence,
                        settlement_status: status.to_string(),
                        deposit_date: settlement.deposit_date,
                        period_from: settlement.period_from,
                        period_to: settlement.period_to,
                        settled_amount: item.amount,
                        gross_amount: settlement.gross_amount,
                        net_amount: settlement.net_amount,
                        commission: settlement.commission,
                        tax: settlement.tax,
                        note: settlement_note(settlement_id, settlement.sequence, status),
                    },
                );
            }
        }

        let updates: Vec<SettlementUpdate> = staged.into_values().collect();
        let records_updated = self.collections.apply_settlement_updates(&updates).await? as usize;

        for settlement in &processable {
            let audit = CreateSettlementAudit {
                region_code: region_code.to_string(),
                settlement_id: settlement.id.unwrap_or_default(),
                settlement_sequence: settlement.sequence,
                settlement_status: settlement.status.clone().unwrap_or_default(),
                period_from: settlement.period_from,
                period_to: settlement.period_to,
                gross_amount: settlement.gross_amount,
                net_amount: settlement.net_amount,
                item_count: settlement.item_count.map(i64::from),
            };
            if let Err(e) = self.audit.append(audit).await {
                warn!(
                    "Audit append failed for settlement {:?} in region {}: {}",
                    settlement.id, region_code, e
                );
            }
        }

        if !orphans.is_empty() {
            warn!(
                "Region {}: {} orphan transactions not found in the ledger: {:?}",
                region_code,
                orphans.len(),
                orphans
            );
        }
        info!(
            "Region {}: reconciled {} settlements, updated {} records, status counts {:?}",
            region_code,
            processable.len(),
            records_updated,
            status_counts
        );

        Ok(ReconciliationOutcome {
            settlements_processed: processable.len(),
            records_updated,
            orphan_transaction_ids: orphans.into_iter().collect(),
        })
    }
}

fn distinct_transaction_ids(settlements: &[&Settlement]) -> BTreeSet<String> {
    settlements
        .iter()
        .flat_map(|s| s.line_items.iter())
        .filter_map(|item| item.external_transaction_id.map(|id| id.to_string()))
        .collect()
}

fn settlement_note(id: i64, sequence: Option<i64>, status: &str) -> String {
    match sequence {
        Some(seq) => format!("Settled - stl#{} seq#{} {}", id, seq, status),
        None => format!("Settled - stl#{} {}", id, status),
    }
}
