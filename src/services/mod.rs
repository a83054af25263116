pub mod correlator;
pub mod polling;
pub mod receipt;
pub mod session;
pub mod subscription;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use correlator::{correlate, extract_preimage, DEFAULT_MATCH_WINDOW, LEDGER_FETCH_LIMIT};
pub use polling::{start_polling, PollingConfig, PollingSubscription};
pub use receipt::{check_zap_receipt, validate_zap_receipt, ReceiptRejection};
pub use session::{SessionState, StopReason};
pub use subscription::{subscribe_to_zap_receipts, ReceiptWatch, ZapReceiptSubscription};
pub use verifier::ZapVerifier;
