//! Settlement records as reported by the payment provider.
//!
//! A settlement ("rendición") is a batch deposit report aggregating many
//! transactions into one transfer. Its line items carry the external
//! transaction ids that the reconciliation engine matches against the local
//! collection ledger.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::date_range::wire_date;

/// Lifecycle of a settlement at the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettlementStatus {
    Pending,
    Deposited,
    Cancelled,
}

impl SettlementStatus {
    /// Parses the provider's status text, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(SettlementStatus::Pending),
            "deposited" => Some(SettlementStatus::Deposited),
            "cancelled" => Some(SettlementStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Pending => "Pending",
            SettlementStatus::Deposited => "Deposited",
            SettlementStatus::Cancelled => "Cancelled",
        }
    }
}

/// One transaction inside a settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementLineItem {
    /// Provider-side unique transaction id, the matching key against the
    /// local ledger. Missing ids are logged and skipped.
    pub external_transaction_id: Option<i64>,

    #[serde(default)]
    pub amount: f64,

    /// Client-side reference attached when the payment was created.
    #[serde(default)]
    pub external_reference: Option<String>,

    /// False for transfer rails whose funds are not deposited.
    #[serde(default = "default_depositable")]
    pub is_depositable: bool,
}

fn default_depositable() -> bool {
    true
}

/// A settlement batch as returned by the provider.
///
/// Fields are optional because the provider omits them freely; a settlement
/// without an id or status is skipped by the engine rather than failing the
/// batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Option<i64>,

    /// Sequential number of this settlement for the organization.
    pub sequence: Option<i64>,

    /// Agreement ("convenio") this settlement belongs to.
    #[serde(default)]
    pub agreement: Option<i64>,

    /// Raw status text; parsed with [`SettlementStatus::parse`].
    pub status: Option<String>,

    #[serde(default, with = "wire_date")]
    pub period_from: Option<NaiveDate>,

    #[serde(default, with = "wire_date")]
    pub period_to: Option<NaiveDate>,

    #[serde(default, with = "wire_date")]
    pub deposit_date: Option<NaiveDate>,

    #[serde(default, with = "wire_date")]
    pub estimated_deposit_date: Option<NaiveDate>,

    /// Gross amount before commissions.
    #[serde(default)]
    pub gross_amount: Option<f64>,

    /// Net amount actually deposited.
    #[serde(default)]
    pub net_amount: Option<f64>,

    #[serde(default)]
    pub commission: Option<f64>,

    #[serde(default)]
    pub tax: Option<f64>,

    /// Number of transactions the provider reports for this settlement.
    #[serde(default)]
    pub item_count: Option<u32>,

    #[serde(default)]
    pub line_items: Vec<SettlementLineItem>,
}

impl Settlement {
    /// A settlement can be reconciled only if it has an id and a non-blank
    /// status. Anything else is logged and skipped, never a batch failure.
    pub fn is_processable(&self) -> bool {
        self.id.is_some()
            && self
                .status
                .as_deref()
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false)
    }

    pub fn parsed_status(&self) -> Option<SettlementStatus> {
        self.status.as_deref().and_then(SettlementStatus::parse)
    }
}
