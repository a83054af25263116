use thiserror::Error;

pub type Result<T> = std::result::Result<T, ZapError>;

#[derive(Error, Debug)]
pub enum ZapError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("API token is required")]
    Authentication,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("Remote error: {status} {body}")]
    Remote { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("LNURL error: {0}")]
    Lnurl(String),

    #[error("Relay error: {0}")]
    Relay(String),

    #[error("Key error: {0}")]
    Key(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ZapError {
    /// Network-layer failures a poller may retry on its next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ZapError::Transport(_) | ZapError::Timeout(_))
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ZapError::Timeout(timeout_secs)
        } else if err.is_decode() {
            ZapError::InvalidResponse(err.to_string())
        } else {
            ZapError::Transport(err.to_string())
        }
    }
}
