use crate::client::LedgerSource;
use crate::models::{LedgerEntry, ZapDescription};
use crate::services::correlator::LEDGER_FETCH_LIMIT;
use crate::services::session::{Session, SessionState, StopReason};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

// Entries are eligible from 10 minutes before polling started until one
// minute past the current poll.
const LOOKBACK_MS: i64 = 600_000;
const LOOKAHEAD_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Handle to a running ledger poller.
pub struct PollingSubscription {
    session: Session,
}

impl PollingSubscription {
    pub fn stop(&self) {
        if self.session.finish(StopReason::Cancelled) {
            tracing::info!("Polling stopped");
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub async fn stopped(&self) -> StopReason {
        self.session.stopped().await
    }
}

/// Polls the ledger every `config.interval` for a confirmed payment whose
/// memo is a zap request with `content == marker`. The first match calls
/// `on_detected` and ends the session; failed polls are logged and retried
/// on the next tick.
pub fn start_polling<F>(
    ledger: Arc<dyn LedgerSource>,
    credential: String,
    marker: String,
    config: PollingConfig,
    on_detected: F,
) -> PollingSubscription
where
    F: FnOnce(LedgerEntry) + Send + 'static,
{
    let session = Session::new();
    let started_ms = Utc::now().timestamp_millis();

    tracing::info!("Starting ledger polling for marker {}", marker);

    tokio::spawn(run_poller(
        session.clone(),
        ledger,
        credential,
        marker,
        config,
        started_ms,
        on_detected,
    ));

    PollingSubscription { session }
}

async fn run_poller<F>(
    session: Session,
    ledger: Arc<dyn LedgerSource>,
    credential: String,
    marker: String,
    config: PollingConfig,
    started_ms: i64,
    on_detected: F,
) where
    F: FnOnce(LedgerEntry) + Send + 'static,
{
    let mut state = session.watch();
    let mut ticker = tokio::time::interval(config.interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = tokio::time::sleep(config.timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;

            changed = state.changed() => {
                if changed.is_err() || !state.borrow().is_running() {
                    return;
                }
            }
            _ = &mut deadline => {
                if session.finish(StopReason::TimedOut) {
                    tracing::info!("Polling timeout for marker {}", marker);
                }
                return;
            }
            _ = ticker.tick() => {
                // The fetch races stop and timeout so a slow ledger cannot
                // hold the session open past its deadline.
                let found = tokio::select! {
                    biased;

                    changed = state.changed() => {
                        if changed.is_err() || !state.borrow().is_running() {
                            return;
                        }
                        continue;
                    }
                    _ = &mut deadline => {
                        if session.finish(StopReason::TimedOut) {
                            tracing::info!("Polling timeout for marker {} during ledger fetch", marker);
                        }
                        return;
                    }
                    found = poll_once(ledger.as_ref(), &credential, &marker, started_ms) => found,
                };
                let Some(entry) = found else {
                    continue;
                };

                if session.finish(StopReason::Detected) {
                    tracing::info!("Payment detected: {}", entry.id);
                    on_detected(entry);
                }
                return;
            }
        }
    }
}

/// One poll. Errors are logged and reported as "nothing found".
pub(crate) async fn poll_once(
    ledger: &dyn LedgerSource,
    credential: &str,
    marker: &str,
    started_ms: i64,
) -> Option<LedgerEntry> {
    let entries = match ledger.fetch_recent_entries(credential, LEDGER_FETCH_LIMIT).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Error during polling: {}", e);
            return None;
        }
    };

    let window_start = started_ms - LOOKBACK_MS;
    let window_end = Utc::now().timestamp_millis() + LOOKAHEAD_MS;
    tracing::debug!("Checking {} payments", entries.len());

    entries.into_iter().find(|entry| {
        entry.confirmed && entry.settled_within(window_start, window_end) && memo_carries(entry, marker)
    })
}

fn memo_carries(entry: &LedgerEntry, marker: &str) -> bool {
    let Some(memo) = entry.memo.as_deref() else {
        return false;
    };
    match serde_json::from_str::<ZapDescription>(memo) {
        Ok(request) => request.content.as_deref() == Some(marker),
        Err(e) => {
            tracing::debug!("Failed to parse memo of {} as JSON: {}", entry.id, e);
            false
        }
    }
}
