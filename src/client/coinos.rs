use crate::error::{Result, ZapError};
use crate::models::{LedgerEntry, PaymentsResponse};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use std::time::Duration;

pub const DEFAULT_COINOS_API_URL: &str = "https://coinos.io/api";
pub const LEDGER_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Read access to a payment processor's settled transactions.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    async fn fetch_recent_entries(&self, credential: &str, limit: usize) -> Result<Vec<LedgerEntry>>;
}

/// Client for the Coinos `/payments` endpoint. No retries here; the
/// caller owns the retry cadence.
#[derive(Clone)]
pub struct CoinosClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl CoinosClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, LEDGER_REQUEST_TIMEOUT)
    }

    /// Like `new` with a different per-request bound.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ZapError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    pub async fn get_payments(&self, token: &str, limit: usize) -> Result<PaymentsResponse> {
        if token.trim().is_empty() {
            return Err(ZapError::Authentication);
        }

        let url = format!("{}/payments", self.base_url);
        tracing::debug!("Requesting ledger payments: {}?limit={}", url, limit);

        let timeout_secs = self.timeout.as_secs();
        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit)])
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ZapError::from_reqwest(e, timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ZapError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ZapError::from_reqwest(e, timeout_secs))?;
        let payments: PaymentsResponse = serde_json::from_str(&body)
            .map_err(|e| ZapError::InvalidResponse(format!("ledger payments: {}", e)))?;

        tracing::debug!("Ledger returned {} payments", payments.payments.len());

        Ok(payments)
    }
}

#[async_trait]
impl LedgerSource for CoinosClient {
    async fn fetch_recent_entries(&self, credential: &str, limit: usize) -> Result<Vec<LedgerEntry>> {
        Ok(self.get_payments(credential, limit).await?.payments)
    }
}
