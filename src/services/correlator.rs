use crate::client::LedgerSource;
use crate::models::{CorrelationVerdict, LedgerEntry, NostrEvent, ZapDescription};
use std::time::Duration;

pub const DEFAULT_MATCH_WINDOW: Duration = Duration::from_secs(600);
pub const LEDGER_FETCH_LIMIT: usize = 100;

/// Preimage carried in the receipt's `preimage` tag.
pub fn extract_preimage(receipt: &NostrEvent) -> Option<&str> {
    receipt.tag_value("preimage").filter(|p| !p.is_empty())
}

/// Matches a zap receipt against recent ledger entries by preimage.
///
/// The first entry (in ledger order) whose preimage equals the receipt's,
/// that is confirmed, and that settled within `window` of the receipt's
/// `created_at` wins. Never fails; ledger errors become rejected verdicts.
pub async fn correlate(
    receipt: &NostrEvent,
    ledger: &dyn LedgerSource,
    credential: &str,
    window: Duration,
) -> CorrelationVerdict {
    let Some(preimage) = extract_preimage(receipt) else {
        tracing::warn!("No preimage tag found in zap receipt {}", receipt.id);
        return CorrelationVerdict::rejected("token extraction failed: no preimage in zap receipt");
    };

    let entries = match ledger.fetch_recent_entries(credential, LEDGER_FETCH_LIMIT).await {
        Ok(entries) => entries,
        Err(e) => return CorrelationVerdict::rejected(e.to_string()),
    };

    let receipt_ms = i64::try_from(receipt.created_at)
        .unwrap_or(i64::MAX / 2)
        .saturating_mul(1000);
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX / 2);
    let (start, end) = (receipt_ms.saturating_sub(window_ms), receipt_ms.saturating_add(window_ms));

    tracing::debug!(
        "Looking for ledger payment with preimage {} between {} and {}",
        preimage,
        start,
        end
    );

    let Some(entry) = find_match(entries, preimage, start, end) else {
        return CorrelationVerdict::rejected("no matching confirmed payment found in ledger");
    };

    tracing::info!("Matched ledger payment {} for receipt {}", entry.id, receipt.id);
    check_memo(&entry, receipt);

    CorrelationVerdict::matched(entry)
}

fn find_match(entries: Vec<LedgerEntry>, preimage: &str, start: i64, end: i64) -> Option<LedgerEntry> {
    entries.into_iter().find(|entry| {
        if entry.preimage.as_deref() != Some(preimage) {
            return false;
        }
        if !entry.settled_within(start, end) {
            tracing::debug!("Payment {} settled outside window at {}", entry.id, entry.created);
            return false;
        }
        if !entry.confirmed {
            tracing::debug!("Payment {} not confirmed yet", entry.id);
            return false;
        }
        true
    })
}

// Advisory only: the preimage match already decided the verdict.
fn check_memo(entry: &LedgerEntry, receipt: &NostrEvent) {
    let Some(memo) = entry.memo.as_deref().filter(|m| !m.is_empty()) else {
        return;
    };
    let memo_id = match serde_json::from_str::<ZapDescription>(memo) {
        Ok(ZapDescription { id: Some(id), .. }) => id,
        Ok(_) => return,
        Err(e) => {
            tracing::debug!("Unable to parse memo of payment {}: {}", entry.id, e);
            return;
        }
    };

    match receipt.description() {
        Some(Ok(description)) if description.id.as_deref() != Some(memo_id.as_str()) => {
            tracing::warn!(
                "Zap request ID mismatch in memo of payment {} (memo {}, receipt {:?})",
                entry.id,
                memo_id,
                description.id
            );
        }
        Some(Err(e)) => tracing::debug!("Unable to parse receipt description: {}", e),
        _ => {}
    }
}
