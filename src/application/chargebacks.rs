//! Chargeback processing against the local ledger.
//!
//! Follows the same contract as settlement reconciliation: one bulk lookup
//! over the distinct disputed transaction ids, annotate the matched rows,
//! report the rest as orphans. Chargebacks carry no settlement fields, so
//! the only ledger mutation is the note.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::chargeback::Chargeback;
use crate::domain::errors::SyncError;
use crate::persistence::collection_repository::CollectionRepository;
use crate::persistence::models::ChargebackNote;

#[derive(Debug, Clone, Default)]
pub struct ChargebackOutcome {
    /// Chargebacks whose transaction id matched a ledger row.
    pub chargebacks_processed: usize,
    /// Distinct disputed transaction ids with no ledger row.
    pub orphan_transaction_ids: Vec<String>,
}

pub struct ChargebackProcessor {
    collections: Arc<dyn CollectionRepository>,
}

impl ChargebackProcessor {
    pub fn new(collections: Arc<dyn CollectionRepository>) -> Self {
        Self { collections }
    }

    pub async fn process(
        &self,
        region_code: &str,
        chargebacks: &[Chargeback],
    ) -> Result<ChargebackOutcome, SyncError> {
        let ids: Vec<String> = chargebacks
            .iter()
            .filter_map(|c| c.external_transaction_id.map(|id| id.to_string()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let known: BTreeSet<String> = self
            .collections
            .find_by_transaction_ids(&ids)
            .await?
            .into_iter()
            .map(|r| r.external_transaction_id)
            .collect();

        let mut staged: BTreeMap<String, ChargebackNote> = BTreeMap::new();
        let mut orphans: BTreeSet<String> = BTreeSet::new();
        let mut matched = 0usize;

        for chargeback in chargebacks {
            let txn_id = match chargeback.external_transaction_id {
                Some(id) => id.to_string(),
                None => {
                    warn!(
                        "Chargeback {:?} has no transaction id, skipping",
                        chargeback.id
                    );
                    continue;
                }
            };

            if !known.contains(&txn_id) {
                orphans.insert(txn_id);
                continue;
            }

            matched += 1;
            staged.insert(
                txn_id.clone(),
                ChargebackNote {
                    external_transaction_id: txn_id,
                    note: chargeback_note(chargeback),
                },
            );
        }

        let notes: Vec<ChargebackNote> = staged.into_values().collect();
        self.collections.apply_chargeback_notes(&notes).await?;

        if !orphans.is_empty() {
            warn!(
                "Region {}: {} chargebacks reference unknown transactions: {:?}",
                region_code,
                orphans.len(),
                orphans
            );
        }
        info!(
            "Region {}: processed {} of {} chargebacks",
            region_code,
            matched,
            chargebacks.len()
        );

        Ok(ChargebackOutcome {
            chargebacks_processed: matched,
            orphan_transaction_ids: orphans.into_iter().collect(),
        })
    }
}

fn chargeback_note(chargeback: &Chargeback) -> String {
    let status = chargeback.status.as_deref().unwrap_or("Unknown").trim();
    match chargeback.id {
        Some(id) => format!("Chargeback #{} {}", id, status),
        None => format!("Chargeback {}", status),
    }
}
