use crate::client::lnurl::into_payment_request;
use crate::error::{Result, ZapError};
use crate::models::{InvoiceResponse, NostrEvent};
use url::Url;

/// Requests a bolt11 invoice from a NIP-57 zap endpoint for `zap_request`.
pub async fn get_zap_invoice(
    client: &reqwest::Client,
    zap_endpoint: &str,
    amount_msats: u64,
    zap_request: &NostrEvent,
) -> Result<String> {
    let mut url = Url::parse(zap_endpoint)
        .map_err(|e| ZapError::Lnurl(format!("invalid zap endpoint: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("amount", &amount_msats.to_string())
        .append_pair("nostr", &serde_json::to_string(zap_request)?);

    tracing::debug!("Requesting zap invoice: {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ZapError::Transport(e.to_string()))?;
    if !response.status().is_success() {
        return Err(ZapError::Lnurl(format!(
            "Cannot get Zap invoice from endpoint: {}",
            response.status()
        )));
    }

    let invoice: InvoiceResponse = response
        .json()
        .await
        .map_err(|e| ZapError::InvalidResponse(e.to_string()))?;
    into_payment_request(invoice, "Zap invoice generation failed")
}
