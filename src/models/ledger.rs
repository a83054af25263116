use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A settled (or pending) payment as reported by the ledger.
/// `created` is in milliseconds since the epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    #[serde(default)]
    pub iid: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub payment_hash: Option<String>,
    // The ledger calls the preimage `ref`.
    #[serde(rename = "ref", default)]
    pub preimage: Option<String>,
    #[serde(default)]
    pub tip: Option<i64>,
    #[serde(rename = "type", default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub confirmed: bool,
    pub created: i64,
}

impl LedgerEntry {
    pub fn settled_within(&self, start_ms: i64, end_ms: i64) -> bool {
        self.created >= start_ms && self.created <= end_ms
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomingTotals {
    #[serde(default)]
    pub tips: f64,
    #[serde(rename = "fiatTips", default)]
    pub fiat_tips: Option<String>,
    #[serde(default)]
    pub sats: f64,
    #[serde(default)]
    pub fiat: Option<String>,
}

/// Body of `GET /payments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentsResponse {
    pub payments: Vec<LedgerEntry>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub incoming: HashMap<String, IncomingTotals>,
    #[serde(default)]
    pub outgoing: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ledger_payload() {
        let body = r#"{
            "payments": [{
                "id": "pay-1",
                "iid": "inv-1",
                "hash": "h",
                "amount": 21,
                "uid": "u",
                "rate": 65000.5,
                "currency": "USD",
                "memo": "{\"content\":\"abc\"}",
                "payment_hash": "ph",
                "ref": "preimage-1",
                "tip": 0,
                "type": "lightning",
                "confirmed": true,
                "created": 1700000000000
            }],
            "count": 1,
            "incoming": {"USD": {"tips": 0, "fiatTips": "0.00", "sats": 21, "fiat": "0.01"}},
            "outgoing": {}
        }"#;

        let response: PaymentsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.count, 1);
        let entry = &response.payments[0];
        assert_eq!(entry.preimage.as_deref(), Some("preimage-1"));
        assert_eq!(entry.payment_type.as_deref(), Some("lightning"));
        assert!(entry.confirmed);
        assert_eq!(response.incoming["USD"].fiat_tips.as_deref(), Some("0.00"));
    }

    #[test]
    fn missing_optional_fields_default() {
        let entry: LedgerEntry =
            serde_json::from_str(r#"{"id":"x","created":5}"#).unwrap();
        assert!(!entry.confirmed);
        assert_eq!(entry.memo, None);
        assert!(entry.settled_within(5, 5));
        assert!(!entry.settled_within(6, 10));
    }

    #[test]
    fn entry_without_timestamp_is_rejected() {
        assert!(serde_json::from_str::<LedgerEntry>(r#"{"id":"x"}"#).is_err());
    }
}
