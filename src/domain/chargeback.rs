//! Chargeback records as reported by the payment provider.
//!
//! A chargeback ("contracargo") is a cardholder dispute against a single
//! transaction, tracked through a status lifecycle until resolution. A
//! pending chargeback close to its response deadline requires urgent
//! operator attention.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::date_range::wire_datetime;

/// Days before the response deadline at which a pending chargeback is
/// flagged as urgent.
const URGENCY_WINDOW_DAYS: i64 = 2;

/// Dispute lifecycle at the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChargebackStatus {
    /// Waiting for a response from the organization.
    Pending,
    /// Already answered by the organization.
    Responded,
    /// Accepted, or expired without a response.
    Accepted,
    /// Settled with the payment network.
    Resolved,
}

impl ChargebackStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(ChargebackStatus::Pending),
            "responded" => Some(ChargebackStatus::Responded),
            "accepted" => Some(ChargebackStatus::Accepted),
            "resolved" => Some(ChargebackStatus::Resolved),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChargebackStatus::Pending => "Pending",
            ChargebackStatus::Responded => "Responded",
            ChargebackStatus::Accepted => "Accepted",
            ChargebackStatus::Resolved => "Resolved",
        }
    }
}

/// One disputed transaction as returned by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chargeback {
    pub id: Option<i64>,

    /// Raw status text; parsed with [`ChargebackStatus::parse`].
    pub status: Option<String>,

    /// Payment network name, e.g. "Visa".
    #[serde(default)]
    pub payment_method: Option<String>,

    /// Provider-side id of the disputed transaction, the matching key
    /// against the local ledger.
    pub external_transaction_id: Option<i64>,

    #[serde(default)]
    pub amount: Option<f64>,

    /// Partially masked card number.
    #[serde(default)]
    pub card_masked: Option<String>,

    /// Deadline for the organization to respond.
    #[serde(default, with = "wire_datetime")]
    pub due_date: Option<NaiveDateTime>,

    #[serde(default, with = "wire_datetime")]
    pub created_at: Option<NaiveDateTime>,

    #[serde(default, with = "wire_datetime")]
    pub resolved_at: Option<NaiveDateTime>,
}

impl Chargeback {
    pub fn parsed_status(&self) -> Option<ChargebackStatus> {
        self.status.as_deref().and_then(ChargebackStatus::parse)
    }

    /// Pending and less than two days away from its response deadline.
    pub fn is_urgent(&self) -> bool {
        if self.parsed_status() != Some(ChargebackStatus::Pending) {
            return false;
        }
        match self.due_date {
            Some(due) => {
                let threshold = due - chrono::Duration::days(URGENCY_WINDOW_DAYS);
                Utc::now().naive_utc() > threshold
            }
            None => false,
        }
    }
}
