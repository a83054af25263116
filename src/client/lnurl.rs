use crate::error::{Result, ZapError};
use crate::models::{InvoiceResponse, LnurlPayResponse};
use tokio::sync::OnceCell;
use url::Url;

/// A `user@domain` payment address resolved through LNURL-pay (LUD-16).
///
/// The pay data and the zap endpoint derived from it are fetched at most
/// once per instance. The zap endpoint cell distinguishes "not resolved
/// yet" (empty) from "resolved, address cannot receive zaps" (`Some(None)`).
pub struct LightningAddress {
    user: String,
    domain: String,
    origin: String,
    client: reqwest::Client,
    pay_data: OnceCell<LnurlPayResponse>,
    zap_endpoint: OnceCell<Option<String>>,
}

impl LightningAddress {
    pub fn parse(address: &str) -> Result<Self> {
        let (user, domain) = address
            .split_once('@')
            .filter(|(user, domain)| !user.is_empty() && !domain.is_empty() && !domain.contains('@'))
            .ok_or_else(|| ZapError::Validation(format!("Invalid lightning address: {}", address)))?;

        Ok(Self {
            user: user.to_string(),
            domain: domain.to_string(),
            origin: format!("https://{}", domain),
            client: reqwest::Client::new(),
            pay_data: OnceCell::new(),
            zap_endpoint: OnceCell::new(),
        })
    }

    /// Overrides the scheme and host used for discovery.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into().trim_end_matches('/').to_string();
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn well_known_url(&self) -> String {
        format!("{}/.well-known/lnurlp/{}", self.origin, self.user)
    }

    pub async fn pay_data(&self) -> Result<&LnurlPayResponse> {
        self.pay_data.get_or_try_init(|| self.fetch_pay_data()).await
    }

    /// Callback accepting zap requests, or `None` when the address does not
    /// advertise NIP-57 support.
    pub async fn zap_endpoint(&self) -> Result<Option<&str>> {
        let endpoint = self
            .zap_endpoint
            .get_or_try_init(|| async {
                let data = self.pay_data().await?;
                Ok::<_, ZapError>(data.supports_zaps().then(|| data.callback.clone()))
            })
            .await?;
        Ok(endpoint.as_deref())
    }

    /// Plain (non-zap) invoice for `amount_msats`.
    pub async fn get_invoice(&self, amount_msats: u64) -> Result<String> {
        let data = self.pay_data().await?;

        if amount_msats > data.max_sendable || amount_msats < data.min_sendable {
            return Err(ZapError::Validation(format!(
                "Amount must be between {} and {} sats",
                data.min_sendable / 1000,
                data.max_sendable / 1000
            )));
        }

        let mut callback = Url::parse(&data.callback)
            .map_err(|e| ZapError::Lnurl(format!("invalid callback URL: {}", e)))?;
        callback
            .query_pairs_mut()
            .append_pair("amount", &amount_msats.to_string());

        let response = self
            .client
            .get(callback)
            .send()
            .await
            .map_err(|e| ZapError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ZapError::Lnurl(format!(
                "Cannot get invoice from lightning address: {}",
                response.status()
            )));
        }

        let invoice: InvoiceResponse = response
            .json()
            .await
            .map_err(|e| ZapError::InvalidResponse(e.to_string()))?;
        into_payment_request(invoice, "Invoice generation failed")
    }

    async fn fetch_pay_data(&self) -> Result<LnurlPayResponse> {
        let url = self.well_known_url();
        tracing::debug!("Fetching LNURL-pay data from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ZapError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ZapError::Lnurl(format!(
                "Cannot fetch lightning address data: {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ZapError::InvalidResponse(e.to_string()))?;

        if body.get("status").and_then(|s| s.as_str()) == Some("ERROR") {
            let reason = body
                .get("reason")
                .and_then(|r| r.as_str())
                .unwrap_or("Lightning address returned error");
            return Err(ZapError::Lnurl(reason.to_string()));
        }

        let data: LnurlPayResponse = serde_json::from_value(body)
            .map_err(|e| ZapError::Lnurl(format!("Invalid lightning address response: {}", e)))?;
        if data.tag != "payRequest" || data.callback.is_empty() {
            return Err(ZapError::Lnurl("Invalid lightning address response".into()));
        }

        Ok(data)
    }
}

pub(crate) fn into_payment_request(invoice: InvoiceResponse, fallback_reason: &str) -> Result<String> {
    if invoice.is_error() {
        return Err(ZapError::Lnurl(
            invoice.reason.unwrap_or_else(|| fallback_reason.to_string()),
        ));
    }
    invoice
        .pr
        .filter(|pr| !pr.is_empty())
        .ok_or_else(|| ZapError::Lnurl("No invoice returned".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn pay_body(callback: &str, allows_nostr: bool) -> String {
        serde_json::json!({
            "callback": callback,
            "maxSendable": 100_000_000u64,
            "minSendable": 1000,
            "metadata": "[[\"text/plain\",\"zap me\"]]",
            "tag": "payRequest",
            "allowsNostr": allows_nostr,
            "nostrPubkey": "9630f464cca6a5147aa8a35f0bcdd3ce485324e732fd39e09233b1d848238f31"
        })
        .to_string()
    }

    #[test]
    fn parses_user_and_domain() {
        let address = LightningAddress::parse("alice@example.com").unwrap();
        assert_eq!(address.user(), "alice");
        assert_eq!(address.domain(), "example.com");
        assert_eq!(
            address.well_known_url(),
            "https://example.com/.well-known/lnurlp/alice"
        );
    }

    #[test]
    fn rejects_strings_without_user_or_domain() {
        assert!(LightningAddress::parse("example.com").is_err());
        assert!(LightningAddress::parse("@example.com").is_err());
        assert!(LightningAddress::parse("alice@").is_err());
        assert!(LightningAddress::parse("a@b@c").is_err());
    }

    #[tokio::test]
    async fn pay_data_is_fetched_once() {
        let mut server = mockito::Server::new_async().await;
        let callback = format!("{}/lnurlp/alice/callback", server.url());
        let discovery = server
            .mock("GET", "/.well-known/lnurlp/alice")
            .with_status(200)
            .with_body(pay_body(&callback, true))
            .expect(1)
            .create_async()
            .await;

        let address = LightningAddress::parse("alice@example.com")
            .unwrap()
            .with_origin(server.url());

        assert_eq!(address.pay_data().await.unwrap().callback, callback);
        assert_eq!(address.zap_endpoint().await.unwrap(), Some(callback.as_str()));
        assert_eq!(address.zap_endpoint().await.unwrap(), Some(callback.as_str()));

        discovery.assert_async().await;
    }

    #[tokio::test]
    async fn zap_endpoint_is_none_without_nostr_support() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/.well-known/lnurlp/bob")
            .with_status(200)
            .with_body(pay_body("https://example.com/cb", false))
            .create_async()
            .await;

        let address = LightningAddress::parse("bob@example.com")
            .unwrap()
            .with_origin(server.url());
        assert_eq!(address.zap_endpoint().await.unwrap(), None);
    }

    #[tokio::test]
    async fn error_status_body_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/.well-known/lnurlp/carol")
            .with_status(200)
            .with_body(r#"{"status":"ERROR","reason":"user not found"}"#)
            .create_async()
            .await;

        let address = LightningAddress::parse("carol@example.com")
            .unwrap()
            .with_origin(server.url());
        let err = address.pay_data().await.unwrap_err();
        assert!(err.to_string().contains("user not found"));
    }

    #[tokio::test]
    async fn wrong_tag_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/.well-known/lnurlp/dave")
            .with_status(200)
            .with_body(r#"{"callback":"https://x/cb","maxSendable":1000,"minSendable":1,"metadata":"","tag":"withdrawRequest"}"#)
            .create_async()
            .await;

        let address = LightningAddress::parse("dave@example.com")
            .unwrap()
            .with_origin(server.url());
        assert!(matches!(address.pay_data().await, Err(ZapError::Lnurl(_))));
    }

    #[tokio::test]
    async fn invoice_requests_amount_from_callback() {
        let mut server = mockito::Server::new_async().await;
        let callback = format!("{}/cb", server.url());
        server
            .mock("GET", "/.well-known/lnurlp/alice")
            .with_status(200)
            .with_body(pay_body(&callback, false))
            .create_async()
            .await;
        let invoice = server
            .mock("GET", "/cb")
            .match_query(Matcher::UrlEncoded("amount".into(), "21000".into()))
            .with_status(200)
            .with_body(r#"{"pr":"lnbc210n1example","routes":[]}"#)
            .create_async()
            .await;

        let address = LightningAddress::parse("alice@example.com")
            .unwrap()
            .with_origin(server.url());
        assert_eq!(address.get_invoice(21_000).await.unwrap(), "lnbc210n1example");
        invoice.assert_async().await;
    }

    #[tokio::test]
    async fn invoice_amount_outside_limits_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/.well-known/lnurlp/alice")
            .with_status(200)
            .with_body(pay_body("https://example.com/cb", false))
            .create_async()
            .await;

        let address = LightningAddress::parse("alice@example.com")
            .unwrap()
            .with_origin(server.url());
        let err = address.get_invoice(500).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Amount must be between 1 and 100000 sats"
        );
    }
}
