//! Row types and write payloads for the collection ledger.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

/// A row of the local collection ledger.
#[derive(Debug, Clone, FromRow)]
pub struct CollectionRecord {
    pub id: i64,
    pub external_transaction_id: String,
    pub region_code: String,
    pub amount: f64,
    pub settlement_id: Option<i64>,
    pub settlement_sequence: Option<i64>,
    pub settlement_status: Option<String>,
    pub deposit_date: Option<NaiveDate>,
    pub period_from: Option<NaiveDate>,
    pub period_to: Option<NaiveDate>,
    pub settled_amount: Option<f64>,
    pub gross_amount: Option<f64>,
    pub net_amount: Option<f64>,
    pub commission: Option<f64>,
    pub tax: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a new ledger row, recorded at collection time.
#[derive(Debug, Clone)]
pub struct CreateCollectionRecord {
    pub external_transaction_id: String,
    pub region_code: String,
    pub amount: f64,
}

/// Settlement details to stamp onto an existing ledger row.
///
/// Applying the same update twice leaves the row unchanged.
#[derive(Debug, Clone)]
pub struct SettlementUpdate {
    pub external_transaction_id: String,
    pub settlement_id: i64,
    pub settlement_sequence: Option<i64>,
    pub settlement_status: String,
    pub deposit_date: Option<NaiveDate>,
    pub period_from: Option<NaiveDate>,
    pub period_to: Option<NaiveDate>,
    pub settled_amount: f64,
    pub gross_amount: Option<f64>,
    pub net_amount: Option<f64>,
    pub commission: Option<f64>,
    pub tax: Option<f64>,
    pub note: String,
}

/// Chargeback annotation for an existing ledger row.
#[derive(Debug, Clone)]
pub struct ChargebackNote {
    pub external_transaction_id: String,
    pub note: String,
}

/// Insert payload for the settlement audit trail.
#[derive(Debug, Clone)]
pub struct CreateSettlementAudit {
    pub region_code: String,
    pub settlement_id: i64,
    pub settlement_sequence: Option<i64>,
    pub settlement_status: String,
    pub period_from: Option<NaiveDate>,
    pub period_to: Option<NaiveDate>,
    pub gross_amount: Option<f64>,
    pub net_amount: Option<f64>,
    pub item_count: Option<i64>,
}

/// A persisted settlement audit row.
#[derive(Debug, Clone, FromRow)]
pub struct SettlementAuditRecord {
    pub id: i64,
    pub region_code: String,
    pub settlement_id: i64,
    pub settlement_sequence: Option<i64>,
    pub settlement_status: String,
    pub period_from: Option<NaiveDate>,
    pub period_to: Option<NaiveDate>,
    pub gross_amount: Option<f64>,
    pub net_amount: Option<f64>,
    pub item_count: Option<i64>,
    pub processed_at: DateTime<Utc>,
}
