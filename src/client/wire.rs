//! Request and response envelopes for the provider protocol.
//!
//! Every call is an HTTP POST with a JSON body carrying the protocol
//! version; authenticated calls add credentials (org id + token) and a date
//! filter. Responses carry a `response_code` interpreted against the code
//! tables below, a human-readable `response_text`, and the payload list.

use serde::{Deserialize, Serialize};

use crate::domain::chargeback::Chargeback;
use crate::domain::settlement::Settlement;

/// Provider response codes, per the protocol documentation.
pub mod codes {
    // Settlement query responses
    pub const SETTLEMENTS_OK: &str = "05001";
    pub const SETTLEMENTS_INVALID_TOKEN: &str = "05002";
    pub const SETTLEMENTS_INTERNAL_ERROR: &str = "05003";
    pub const SETTLEMENTS_RANGE_EXCEEDED: &str = "05004";
    pub const SETTLEMENTS_INVALID_PARAMETER: &str = "05005";

    // Chargeback query responses
    pub const CHARGEBACKS_OK: &str = "06001";
    pub const CHARGEBACKS_INVALID_TOKEN: &str = "06002";
    pub const CHARGEBACKS_INTERNAL_ERROR: &str = "06003";
    pub const CHARGEBACKS_INVALID_RANGE: &str = "06004";
    pub const CHARGEBACKS_INVALID_PARAMETER: &str = "06005";
    pub const CHARGEBACKS_INVALID_VERSION: &str = "06006";
}

/// API endpoints, relative to the configured base URL.
pub mod endpoints {
    pub const TOKEN: &str = "/get_token";
    pub const SETTLEMENTS: &str = "/get_settlements";
    pub const CHARGEBACKS: &str = "/get_chargebacks";
}

/// Credentials block attached to every authenticated request.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub org_id: i64,
    pub token: String,
}

/// Inclusive date filter, dates in dd/MM/yyyy.
#[derive(Debug, Clone, Serialize)]
pub struct DateFilter {
    pub date_from: String,
    pub date_to: String,
}

#[derive(Debug, Serialize)]
pub struct TokenRequest {
    pub version: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub response_code: String,
    #[serde(default)]
    pub response_text: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl TokenResponse {
    /// Success is defined by a non-empty token, not by the response code.
    pub fn is_success(&self) -> bool {
        self.token.as_deref().map(|t| !t.is_empty()).unwrap_or(false)
    }
}

#[derive(Debug, Serialize)]
pub struct SettlementsRequest {
    pub version: String,
    pub credentials: Credentials,
    /// Region code scoping the query to one regional ledger.
    pub region: String,
    pub filter: DateFilter,
}

#[derive(Debug, Deserialize)]
pub struct SettlementsResponse {
    #[serde(default)]
    pub response_code: String,
    #[serde(default)]
    pub response_text: String,
    /// Absent and empty are equivalent: no settlements in the range.
    #[serde(default)]
    pub settlements: Vec<Settlement>,
}

#[derive(Debug, Serialize)]
pub struct ChargebacksRequest {
    pub version: String,
    pub credentials: Credentials,
    pub region: String,
    pub filter: DateFilter,
}

#[derive(Debug, Deserialize)]
pub struct ChargebacksResponse {
    #[serde(default)]
    pub response_code: String,
    #[serde(default)]
    pub response_text: String,
    #[serde(default)]
    pub chargebacks: Vec<Chargeback>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_success_requires_non_empty_token() {
        let with_token: TokenResponse = serde_json::from_value(serde_json::json!({
            "response_code": "00001",
            "response_text": "ok",
            "token": "abc123"
        }))
        .unwrap();
        assert!(with_token.is_success());

        let empty: TokenResponse = serde_json::from_value(serde_json::json!({
            "response_code": "00001",
            "response_text": "ok",
            "token": ""
        }))
        .unwrap();
        assert!(!empty.is_success());

        let missing: TokenResponse =
            serde_json::from_value(serde_json::json!({ "response_text": "denied" })).unwrap();
        assert!(!missing.is_success());
    }

    #[test]
    fn test_settlements_response_defaults_to_empty_list() {
        let response: SettlementsResponse = serde_json::from_value(serde_json::json!({
            "response_code": "05001",
            "response_text": "ok"
        }))
        .unwrap();
        assert!(response.settlements.is_empty());
    }

    #[test]
    fn test_settlement_payload_roundtrip_from_wire() {
        let response: SettlementsResponse = serde_json::from_value(serde_json::json!({
            "response_code": "05001",
            "response_text": "settlements returned",
            "settlements": [{
                "id": 9001,
                "sequence": 12,
                "status": "Deposited",
                "period_from": "01/01/2025",
                "period_to": "07/01/2025",
                "deposit_date": "09/01/2025",
                "gross_amount": 1500.0,
                "net_amount": 1450.0,
                "commission": 40.0,
                "tax": 10.0,
                "line_items": [
                    { "external_transaction_id": 555, "amount": 1500.0, "is_depositable": true }
                ]
            }]
        }))
        .unwrap();

        let settlement = &response.settlements[0];
        assert_eq!(settlement.id, Some(9001));
        assert_eq!(
            settlement.period_from,
            chrono::NaiveDate::from_ymd_opt(2025, 1, 1)
        );
        assert_eq!(settlement.line_items[0].external_transaction_id, Some(555));
    }
}
