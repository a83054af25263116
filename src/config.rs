use crate::client::{default_relays, DEFAULT_COINOS_API_URL};
use crate::nostr::events::DEFAULT_ZAP_AMOUNT_MSATS;
use crate::nostr::message::DEFAULT_RESULT_HASHTAG;
use anyhow::{bail, Context, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    Subscribe,
    Poll,
}

#[derive(Clone)]
pub struct Config {
    pub nsec: String,
    pub lightning_address: String,
    pub relays: Vec<String>,

    // Ledger
    pub coinos_api_url: String,
    pub coinos_api_token: Option<String>,

    // Watching
    pub watch_mode: WatchMode,
    pub zap_amount_msats: u64,
    pub poll_interval: Duration,
    pub watch_timeout: Duration,
    pub verify_window: Duration,
    pub strict_receipts: bool,

    // Result note
    pub result_hashtag: String,
    pub lucky_min: u32,
    pub lucky_max: u32,
    pub fortune_file: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("lightning_address", &self.lightning_address)
            .field("relays", &self.relays)
            .field("coinos_api_url", &self.coinos_api_url)
            .field("coinos_api_token", &self.coinos_api_token.as_ref().map(|_| "<redacted>"))
            .field("watch_mode", &self.watch_mode)
            .field("zap_amount_msats", &self.zap_amount_msats)
            .field("poll_interval", &self.poll_interval)
            .field("watch_timeout", &self.watch_timeout)
            .field("verify_window", &self.verify_window)
            .field("strict_receipts", &self.strict_receipts)
            .field("result_hashtag", &self.result_hashtag)
            .field("lucky_min", &self.lucky_min)
            .field("lucky_max", &self.lucky_max)
            .field("fortune_file", &self.fortune_file)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            nsec: var("NOSTR_NSEC").context("NOSTR_NSEC required")?,
            lightning_address: var("LIGHTNING_ADDRESS").context("LIGHTNING_ADDRESS required")?,
            relays: var("RELAYS")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_else(default_relays),

            coinos_api_url: var("COINOS_API_URL").unwrap_or_else(|| DEFAULT_COINOS_API_URL.to_string()),
            coinos_api_token: var("COINOS_API_TOKEN"),

            watch_mode: var("WATCH_MODE")
                .unwrap_or_else(|| "subscribe".to_string())
                .parse()?,
            zap_amount_msats: parse_or(&var, "ZAP_AMOUNT_MSATS", DEFAULT_ZAP_AMOUNT_MSATS)?,
            poll_interval: Duration::from_secs(parse_or(&var, "POLL_INTERVAL_SECS", 10)?),
            watch_timeout: Duration::from_secs(parse_or(&var, "WATCH_TIMEOUT_SECS", 300)?),
            verify_window: Duration::from_secs(parse_or(&var, "VERIFY_WINDOW_SECS", 600)?),
            strict_receipts: parse_bool(var("STRICT_RECEIPTS"), true)?,

            result_hashtag: var("RESULT_HASHTAG").unwrap_or_else(|| DEFAULT_RESULT_HASHTAG.to_string()),
            lucky_min: parse_or(&var, "LUCKY_MIN", 1)?,
            lucky_max: parse_or(&var, "LUCKY_MAX", 100)?,
            fortune_file: var("FORTUNE_FILE"),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.coinos_api_url.starts_with("http") {
            bail!("COINOS_API_URL must be HTTP(S) URL");
        }
        if self.relays.is_empty() {
            bail!("RELAYS must list at least one relay");
        }
        if let Some(relay) = self
            .relays
            .iter()
            .find(|r| !(r.starts_with("ws://") || r.starts_with("wss://")))
        {
            bail!("Relay URL must be ws(s): {}", relay);
        }
        if self.poll_interval.is_zero() {
            bail!("POLL_INTERVAL_SECS must be positive");
        }
        if self.watch_timeout.is_zero() {
            bail!("WATCH_TIMEOUT_SECS must be positive");
        }
        if self.lucky_min > self.lucky_max {
            bail!("LUCKY_MIN must not exceed LUCKY_MAX");
        }
        if self.watch_mode == WatchMode::Poll && self.coinos_api_token.is_none() {
            bail!("COINOS_API_TOKEN required in poll mode");
        }

        tracing::info!("Configuration validated for {:?} mode", self.watch_mode);

        Ok(())
    }

    /// Ledger verification runs only with a token.
    pub fn ledger_enabled(&self) -> bool {
        self.coinos_api_token.is_some()
    }
}

impl FromStr for WatchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "subscribe" | "subscription" => Ok(WatchMode::Subscribe),
            "poll" | "polling" => Ok(WatchMode::Poll),
            _ => bail!("Unknown watch mode: {}", s),
        }
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.parse().with_context(|| format!("Invalid {}", key)),
        None => Ok(default),
    }
}

fn parse_bool(raw: Option<String>, default: bool) -> Result<bool> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("Invalid STRICT_RECEIPTS: {}", raw),
    }
}
