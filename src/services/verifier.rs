use crate::client::LedgerSource;
use crate::models::{NostrEvent, VerificationOutcome};
use crate::services::correlator::{correlate, DEFAULT_MATCH_WINDOW};
use crate::services::receipt::validate_zap_receipt;
use std::sync::Arc;
use std::time::Duration;

/// Combines protocol validation with optional ledger correlation.
#[derive(Clone)]
pub struct ZapVerifier {
    ledger: Arc<dyn LedgerSource>,
    window: Duration,
}

impl ZapVerifier {
    pub fn new(ledger: Arc<dyn LedgerSource>) -> Self {
        Self {
            ledger,
            window: DEFAULT_MATCH_WINDOW,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Protocol checks first; the ledger is only consulted when they pass
    /// and a non-blank credential is given. Once consulted, the ledger's
    /// answer is final.
    pub async fn verify(
        &self,
        receipt: &NostrEvent,
        target_event_id: &str,
        zap_request: &NostrEvent,
        strict: bool,
        credential: Option<&str>,
    ) -> VerificationOutcome {
        if !validate_zap_receipt(receipt, target_event_id, zap_request, strict) {
            return VerificationOutcome::invalid("basic validation failed");
        }

        let Some(credential) = credential.map(str::trim).filter(|c| !c.is_empty()) else {
            tracing::debug!("No ledger credential, accepting receipt {} on protocol checks", receipt.id);
            return VerificationOutcome::protocol_only();
        };

        // Run on its own task so a misbehaving ledger cannot take the
        // caller down with it.
        let ledger = Arc::clone(&self.ledger);
        let receipt = receipt.clone();
        let credential = credential.to_string();
        let window = self.window;
        let correlation =
            tokio::spawn(async move { correlate(&receipt, ledger.as_ref(), &credential, window).await });

        match correlation.await {
            Ok(verdict) if verdict.verified => VerificationOutcome::ledger_confirmed(),
            Ok(verdict) => {
                let reason = verdict.error.unwrap_or_else(|| "unknown reason".to_string());
                tracing::warn!("Ledger rejected zap receipt: {}", reason);
                VerificationOutcome::ledger_rejected(&reason)
            }
            Err(e) => {
                tracing::error!("Zap verification crashed: {}", e);
                VerificationOutcome::invalid(format!("verification error: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZapError;
    use crate::services::receipt::fixtures::{receipt, zap_request, TARGET_ID};
    use crate::services::testing::{entry, Reply, StaticLedger};

    const RECEIPT_MS: i64 = 1_700_000_000_000;

    fn verifier(ledger: &Arc<StaticLedger>) -> ZapVerifier {
        ZapVerifier::new(ledger.clone())
    }

    #[tokio::test]
    async fn confirmed_ledger_entry_verifies_receipt() {
        let ledger = Arc::new(StaticLedger::with_entries(vec![entry("p", "X", true, RECEIPT_MS + 1_000)]));
        let outcome = verifier(&ledger)
            .verify(&receipt("X"), TARGET_ID, &zap_request(), true, Some("token"))
            .await;

        assert_eq!(outcome, VerificationOutcome::ledger_confirmed());
        assert!(outcome.valid);
        assert_eq!(outcome.ledger_verified, Some(true));
    }

    #[tokio::test]
    async fn unconfirmed_ledger_entry_rejects_receipt() {
        let ledger = Arc::new(StaticLedger::with_entries(vec![entry("p", "X", false, RECEIPT_MS)]));
        let outcome = verifier(&ledger)
            .verify(&receipt("X"), TARGET_ID, &zap_request(), true, Some("token"))
            .await;

        assert!(!outcome.valid);
        assert_eq!(outcome.ledger_verified, Some(false));
        let error = outcome.error.unwrap();
        assert!(error.starts_with("ledger verification failed: "));
        assert!(error.contains("no matching confirmed payment"));
    }

    #[tokio::test]
    async fn protocol_failure_skips_ledger() {
        let ledger = Arc::new(StaticLedger::with_entries(vec![entry("p", "X", true, RECEIPT_MS)]));
        let mut bad = receipt("X");
        bad.kind = 1;

        let outcome = verifier(&ledger)
            .verify(&bad, TARGET_ID, &zap_request(), true, Some("token"))
            .await;

        assert_eq!(outcome, VerificationOutcome::invalid("basic validation failed"));
        assert_eq!(ledger.calls(), 0);
    }

    #[tokio::test]
    async fn missing_credential_degrades_to_protocol_only() {
        let ledger = Arc::new(StaticLedger::with_entries(Vec::new()));

        for credential in [None, Some(""), Some("   ")] {
            let outcome = verifier(&ledger)
                .verify(&receipt("X"), TARGET_ID, &zap_request(), true, credential)
                .await;
            assert!(outcome.valid);
            assert_eq!(outcome.ledger_verified, Some(false));
            assert_eq!(outcome.error, None);
        }
        assert_eq!(ledger.calls(), 0);
    }

    #[tokio::test]
    async fn ledger_transport_error_is_a_rejection() {
        let ledger = Arc::new(StaticLedger::failing(|| ZapError::Timeout(10)));
        let outcome = verifier(&ledger)
            .verify(&receipt("X"), TARGET_ID, &zap_request(), true, Some("token"))
            .await;

        assert!(!outcome.valid);
        assert_eq!(
            outcome.error.as_deref(),
            Some("ledger verification failed: Request timeout after 10s")
        );
    }

    #[tokio::test]
    async fn crashing_ledger_is_contained() {
        let ledger = Arc::new(StaticLedger::scripted(vec![Reply::Panic]));
        let outcome = verifier(&ledger)
            .verify(&receipt("X"), TARGET_ID, &zap_request(), true, Some("token"))
            .await;

        assert!(!outcome.valid);
        assert_eq!(outcome.ledger_verified, None);
        let error = outcome.error.unwrap();
        assert!(error.starts_with("verification error: "));
        assert!(error.contains("panicked"));
    }

    #[tokio::test]
    async fn custom_window_applies() {
        let ledger = Arc::new(StaticLedger::with_entries(vec![entry("p", "X", true, RECEIPT_MS + 120_000)]));
        let narrow = ZapVerifier::new(ledger.clone()).with_window(Duration::from_secs(60));
        let outcome = narrow
            .verify(&receipt("X"), TARGET_ID, &zap_request(), true, Some("token"))
            .await;
        assert!(!outcome.valid);
    }
}
