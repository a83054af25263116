use crate::models::{NostrEvent, ZAP_RECEIPT_KIND};
use std::fmt;

/// Why a zap receipt failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptRejection {
    InvalidKind(u32),
    MissingRequiredTags,
    EventIdMismatch { found: String, expected: String },
    InvalidDescription(String),
    DescriptionIdMismatch,
}

impl fmt::Display for ReceiptRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptRejection::InvalidKind(kind) => write!(f, "invalid kind: {}", kind),
            ReceiptRejection::MissingRequiredTags => write!(f, "missing required tags"),
            ReceiptRejection::EventIdMismatch { found, expected } => {
                write!(f, "event ID mismatch: {} expected: {}", found, expected)
            }
            ReceiptRejection::InvalidDescription(e) => write!(f, "invalid description JSON: {}", e),
            ReceiptRejection::DescriptionIdMismatch => write!(f, "description ID mismatch"),
        }
    }
}

/// NIP-57 Appendix F checks, in order, stopping at the first failure.
///
/// With `strict` off the description is not compared against the zap
/// request, which admits receipts for payments that never echoed it.
pub fn check_zap_receipt(
    receipt: &NostrEvent,
    target_event_id: &str,
    zap_request: &NostrEvent,
    strict: bool,
) -> Result<(), ReceiptRejection> {
    if receipt.kind != ZAP_RECEIPT_KIND {
        return Err(ReceiptRejection::InvalidKind(receipt.kind));
    }

    if !receipt.has_tag("bolt11") || !receipt.has_tag("description") {
        return Err(ReceiptRejection::MissingRequiredTags);
    }

    if let Some(e_tag) = receipt.find_tag("e") {
        let found = e_tag.get(1).map(String::as_str).unwrap_or_default();
        if found != target_event_id {
            return Err(ReceiptRejection::EventIdMismatch {
                found: found.to_string(),
                expected: target_event_id.to_string(),
            });
        }
    }

    if strict {
        let description = match receipt.description() {
            Some(Ok(description)) => description,
            Some(Err(e)) => return Err(ReceiptRejection::InvalidDescription(e.to_string())),
            None => return Err(ReceiptRejection::MissingRequiredTags),
        };
        if description.id.as_deref() != Some(zap_request.id.as_str()) {
            return Err(ReceiptRejection::DescriptionIdMismatch);
        }
    }

    Ok(())
}

pub fn validate_zap_receipt(
    receipt: &NostrEvent,
    target_event_id: &str,
    zap_request: &NostrEvent,
    strict: bool,
) -> bool {
    match check_zap_receipt(receipt, target_event_id, zap_request, strict) {
        Ok(()) => true,
        Err(rejection) => {
            tracing::warn!("Rejected zap receipt {}: {}", receipt.id, rejection);
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{NostrEvent, ZAP_RECEIPT_KIND, ZAP_REQUEST_KIND};

    pub const TARGET_ID: &str = "target-event";
    pub const REQUEST_ID: &str = "zap-request";

    pub fn zap_request() -> NostrEvent {
        NostrEvent {
            id: REQUEST_ID.into(),
            pubkey: "zapper".into(),
            created_at: 1_700_000_000,
            kind: ZAP_REQUEST_KIND,
            tags: vec![vec!["e".into(), TARGET_ID.into()]],
            content: String::new(),
            sig: String::new(),
        }
    }

    pub fn receipt_with(tags: Vec<Vec<String>>) -> NostrEvent {
        NostrEvent {
            id: "receipt".into(),
            pubkey: "lnurl-service".into(),
            created_at: 1_700_000_000,
            kind: ZAP_RECEIPT_KIND,
            tags,
            content: String::new(),
            sig: String::new(),
        }
    }

    /// Well-formed receipt for `REQUEST_ID` carrying `preimage`.
    pub fn receipt(preimage: &str) -> NostrEvent {
        receipt_with(vec![
            vec!["e".into(), TARGET_ID.into()],
            vec!["bolt11".into(), "lnbc10n1invoice".into()],
            vec!["preimage".into(), preimage.into()],
            vec![
                "description".into(),
                format!(r#"{{"id":"{}","pubkey":"zapper","kind":9734}}"#, REQUEST_ID),
            ],
        ])
    }
}
