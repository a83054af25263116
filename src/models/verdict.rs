use crate::models::LedgerEntry;
use serde::Serialize;

/// Outcome of matching a receipt against the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationVerdict {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_payment: Option<LedgerEntry>,
}

impl CorrelationVerdict {
    pub fn matched(entry: LedgerEntry) -> Self {
        Self {
            verified: true,
            error: None,
            matched_payment: Some(entry),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            verified: false,
            error: Some(reason.into()),
            matched_payment: None,
        }
    }
}

/// Final verdict for one receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationOutcome {
    pub fn protocol_only() -> Self {
        Self {
            valid: true,
            ledger_verified: Some(false),
            error: None,
        }
    }

    pub fn ledger_confirmed() -> Self {
        Self {
            valid: true,
            ledger_verified: Some(true),
            error: None,
        }
    }

    pub fn ledger_rejected(reason: &str) -> Self {
        Self {
            valid: false,
            ledger_verified: Some(false),
            error: Some(format!("ledger verification failed: {}", reason)),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            ledger_verified: None,
            error: Some(reason.into()),
        }
    }
}
