use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

/// 8 random bytes, base64url without padding. Used as the out-of-band
/// marker the poller looks for in ledger memos.
pub fn random_marker() -> String {
    let bytes: [u8; 8] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}
