use serde::{Deserialize, Serialize};

/// LUD-06 `payRequest` body served from `/.well-known/lnurlp/<user>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LnurlPayResponse {
    pub callback: String,
    pub max_sendable: u64,
    #[serde(default)]
    pub min_sendable: u64,
    #[serde(default)]
    pub metadata: String,
    pub tag: String,
    #[serde(default)]
    pub allows_nostr: Option<bool>,
    #[serde(default)]
    pub nostr_pubkey: Option<String>,
}

impl LnurlPayResponse {
    pub fn supports_zaps(&self) -> bool {
        self.allows_nostr == Some(true) && self.nostr_pubkey.is_some()
    }
}

/// Body returned by an invoice callback or a zap endpoint. Error bodies
/// use `status: "ERROR"` with a `reason`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceResponse {
    #[serde(default)]
    pub pr: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl InvoiceResponse {
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("ERROR")
    }
}
