use crate::client::RelayTransport;
use crate::error::Result;
use crate::models::{Filter, NostrEvent, VerificationOutcome};
use crate::nostr::unix_now;
use crate::services::session::{Session, SessionState, StopReason};
use crate::services::verifier::ZapVerifier;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const DEFAULT_WATCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Grace period between closing the logical subscription and dropping the
/// relay connections, so a pending CLOSE can still go out.
pub const CONNECTION_CLOSE_DELAY: Duration = Duration::from_secs(1);

/// What a receipt subscription is waiting for.
#[derive(Debug, Clone)]
pub struct ReceiptWatch {
    pub target_event_id: String,
    pub zap_request: NostrEvent,
    pub strict: bool,
    pub credential: Option<String>,
    pub timeout: Duration,
}

pub struct ZapReceiptSubscription {
    subscription_id: String,
    event_id: String,
    session: Session,
    worker: JoinHandle<()>,
}

impl ZapReceiptSubscription {
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn stop(&self) {
        if self.session.finish(StopReason::Cancelled) {
            tracing::info!("Stopping zap subscription for event {}", self.event_id);
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub async fn stopped(&self) -> StopReason {
        self.session.stopped().await
    }

    /// Waits until the subscription is closed on the transport and its
    /// connections are dropped. Call after `stop()` or once `stopped()`
    /// resolves, before the runtime shuts down.
    pub async fn closed(self) {
        if let Err(e) = self.worker.await {
            tracing::warn!("Zap subscription {} worker failed: {}", self.subscription_id, e);
        }
    }
}

enum Closing {
    Deferred,
    Immediate,
}

/// Subscribes to zap receipts for `watch.target_event_id` and verifies each
/// one as it arrives. The first receipt that verifies is handed to
/// `on_zap` and closes the subscription; rejected receipts are dropped and
/// the subscription stays open until `watch.timeout`.
pub async fn subscribe_to_zap_receipts<F>(
    transport: Arc<dyn RelayTransport>,
    verifier: ZapVerifier,
    watch: ReceiptWatch,
    on_zap: F,
) -> Result<ZapReceiptSubscription>
where
    F: FnOnce(NostrEvent) + Send + 'static,
{
    let subscription_id = format!("zap-{}", Uuid::new_v4().simple());
    let filter = Filter::zap_receipts_for(&watch.target_event_id, unix_now());

    tracing::info!(
        "Starting zap subscription {} for event {}",
        subscription_id,
        watch.target_event_id
    );
    tracing::debug!("Filter: {}", serde_json::to_string(&filter)?);

    let events = transport.subscribe(&subscription_id, filter).await?;
    let session = Session::new();
    let event_id = watch.target_event_id.clone();

    let worker = tokio::spawn(run_subscriber(
        session.clone(),
        transport,
        verifier,
        subscription_id.clone(),
        watch,
        events,
        on_zap,
    ));

    Ok(ZapReceiptSubscription {
        subscription_id,
        event_id,
        session,
        worker,
    })
}

async fn run_subscriber<F>(
    session: Session,
    transport: Arc<dyn RelayTransport>,
    verifier: ZapVerifier,
    subscription_id: String,
    watch: ReceiptWatch,
    mut events: mpsc::Receiver<NostrEvent>,
    on_zap: F,
) where
    F: FnOnce(NostrEvent) + Send + 'static,
{
    let mut state = session.watch();
    let deadline = tokio::time::sleep(watch.timeout);
    tokio::pin!(deadline);

    let target = Arc::new(watch.target_event_id);
    let zap_request = Arc::new(watch.zap_request);
    let credential = watch.credential.map(Arc::new);

    let mut pending: FuturesUnordered<BoxFuture<'static, (NostrEvent, VerificationOutcome)>> =
        FuturesUnordered::new();
    let mut seen = HashSet::new();
    let mut stream_open = true;
    let mut on_zap = Some(on_zap);

    let closing = loop {
        tokio::select! {
            biased;

            changed = state.changed() => {
                if changed.is_err() || !state.borrow().is_running() {
                    break Closing::Deferred;
                }
            }
            _ = &mut deadline => {
                if session.finish(StopReason::TimedOut) {
                    tracing::info!("Zap subscription timeout for event {}", target);
                }
                break Closing::Immediate;
            }
            Some((receipt, outcome)) = pending.next(), if !pending.is_empty() => {
                if !outcome.valid {
                    tracing::warn!(
                        "Invalid zap receipt {} for event {}: {}",
                        receipt.id,
                        target,
                        outcome.error.as_deref().unwrap_or("unknown reason")
                    );
                    continue;
                }
                if session.finish(StopReason::Detected) {
                    tracing::info!("Valid zap receipt {} detected for event {}", receipt.id, target);
                    if let Some(on_zap) = on_zap.take() {
                        on_zap(receipt);
                    }
                }
                break Closing::Deferred;
            }
            received = events.recv(), if stream_open => match received {
                Some(receipt) => {
                    if !seen.insert(receipt.id.clone()) {
                        tracing::debug!("Duplicate zap receipt {}", receipt.id);
                        continue;
                    }
                    tracing::debug!("Received zap receipt {}", receipt.id);

                    let verifier = verifier.clone();
                    let target = Arc::clone(&target);
                    let zap_request = Arc::clone(&zap_request);
                    let credential = credential.clone();
                    let strict = watch.strict;
                    pending.push(
                        async move {
                            let outcome = verifier
                                .verify(&receipt, &target, &zap_request, strict, credential.as_deref().map(String::as_str))
                                .await;
                            (receipt, outcome)
                        }
                        .boxed(),
                    );
                }
                None => {
                    tracing::debug!("Relay event stream for {} ended", subscription_id);
                    stream_open = false;
                }
            }
        }
    };

    transport.unsubscribe(&subscription_id).await;
    if let Closing::Deferred = closing {
        tokio::time::sleep(CONNECTION_CLOSE_DELAY).await;
    }
    transport.shutdown(&subscription_id).await;
    tracing::debug!("Zap subscription {} closed", subscription_id);
}
