use crate::error::{Result, ZapError};
use crate::models::{Filter, NostrEvent, RelayMessage};
use async_trait::async_trait;
use futures::{future::join_all, SinkExt, StreamExt};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

pub const DEFAULT_RELAYS: [&str; 3] = [
    "wss://relay.damus.io/",
    "wss://nos.lol/",
    "wss://relay.nostr.band/",
];

pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

const EVENT_BUFFER: usize = 64;

pub fn default_relays() -> Vec<String> {
    DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect()
}

/// Live event delivery from one or more relays.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Opens a logical subscription; matching events are pushed into the
    /// returned channel until `unsubscribe` or `shutdown`.
    async fn subscribe(&self, subscription_id: &str, filter: Filter) -> Result<mpsc::Receiver<NostrEvent>>;

    async fn unsubscribe(&self, subscription_id: &str);

    /// Drops the relay connections still held by `subscription_id`.
    /// Other subscriptions on the same transport are left running.
    async fn shutdown(&self, subscription_id: &str);

    async fn publish(&self, event: &NostrEvent) -> Result<()>;
}

struct ActiveSubscription {
    close: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

/// NIP-01 client over one websocket per relay per subscription.
pub struct RelayPool {
    relays: Vec<String>,
    subscriptions: Mutex<HashMap<String, ActiveSubscription>>,
}

impl RelayPool {
    pub fn new(relays: Vec<String>) -> Self {
        Self {
            relays,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    pub fn relays(&self) -> &[String] {
        &self.relays
    }
}

#[async_trait]
impl RelayTransport for RelayPool {
    async fn subscribe(&self, subscription_id: &str, filter: Filter) -> Result<mpsc::Receiver<NostrEvent>> {
        if self.relays.is_empty() {
            return Err(ZapError::Relay("no relays configured".into()));
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (close_tx, close_rx) = watch::channel(false);

        let tasks = self
            .relays
            .iter()
            .map(|url| {
                tokio::spawn(run_subscription(
                    url.clone(),
                    subscription_id.to_string(),
                    filter.clone(),
                    events_tx.clone(),
                    close_rx.clone(),
                ))
            })
            .collect();

        let previous = self.subscriptions.lock().await.insert(
            subscription_id.to_string(),
            ActiveSubscription { close: close_tx, tasks },
        );
        if let Some(previous) = previous {
            let _ = previous.close.send(true);
        }

        tracing::info!(
            "Subscribed {} on {} relays",
            subscription_id,
            self.relays.len()
        );

        Ok(events_rx)
    }

    async fn unsubscribe(&self, subscription_id: &str) {
        if let Some(subscription) = self.subscriptions.lock().await.get(subscription_id) {
            let _ = subscription.close.send(true);
            tracing::debug!("Closing subscription {}", subscription_id);
        }
    }

    async fn shutdown(&self, subscription_id: &str) {
        let Some(subscription) = self.subscriptions.lock().await.remove(subscription_id) else {
            return;
        };
        let _ = subscription.close.send(true);
        for task in subscription.tasks {
            task.abort();
        }
        tracing::debug!("Dropped relay connections for {}", subscription_id);
    }

    async fn publish(&self, event: &NostrEvent) -> Result<()> {
        let attempts = self.relays.iter().map(|url| async move {
            match tokio::time::timeout(PUBLISH_TIMEOUT, publish_to_relay(url, event)).await {
                Ok(result) => result.map_err(|e| format!("{}: {}", url, e)),
                Err(_) => Err(format!("{}: Publish timeout", url)),
            }
        });

        let results = join_all(attempts).await;
        let errors: Vec<String> = results.iter().filter_map(|r| r.clone().err()).collect();

        if errors.len() == results.len() {
            tracing::error!("All relays failed: {:?}", errors);
            return Err(ZapError::Relay(format!(
                "Failed to publish to any relay. Errors: {}",
                errors.join(", ")
            )));
        }

        tracing::info!(
            "Event {} published to {}/{} relays",
            event.id,
            results.len() - errors.len(),
            results.len()
        );
        Ok(())
    }
}

async fn run_subscription(
    url: String,
    subscription_id: String,
    filter: Filter,
    events: mpsc::Sender<NostrEvent>,
    mut close: watch::Receiver<bool>,
) {
    let (socket, _) = match connect_async(url.as_str()).await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!("Failed to connect to {}: {}", url, e);
            return;
        }
    };
    let (mut write, mut read) = socket.split();

    let request = serde_json::json!(["REQ", subscription_id, filter]).to_string();
    if let Err(e) = write.send(Message::Text(request)).await {
        tracing::warn!("Failed to send REQ to {}: {}", url, e);
        return;
    }

    loop {
        tokio::select! {
            changed = close.changed() => {
                if changed.is_err() || *close.borrow() {
                    let close_msg = serde_json::json!(["CLOSE", subscription_id]).to_string();
                    let _ = write.send(Message::Text(close_msg)).await;
                    let _ = write.close().await;
                    break;
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match RelayMessage::parse(&text) {
                    Ok(RelayMessage::Event { subscription_id: sid, event }) if sid == subscription_id => {
                        if let Err(e) = event.verify() {
                            tracing::warn!("Dropping event from {}: {}", url, e);
                            continue;
                        }
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(RelayMessage::EndOfStoredEvents(sid)) => {
                        tracing::debug!("End of stored events from {} for {}", url, sid);
                    }
                    Ok(RelayMessage::Closed { message, .. }) => {
                        tracing::debug!("{} closed subscription: {}", url, message);
                        break;
                    }
                    Ok(RelayMessage::Notice(notice)) => {
                        tracing::debug!("Notice from {}: {}", url, notice);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!("Ignoring message from {}: {}", url, e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("Connection to {} failed: {}", url, e);
                    break;
                }
            }
        }
    }
}

async fn publish_to_relay(url: &str, event: &NostrEvent) -> Result<()> {
    let (socket, _) = connect_async(url)
        .await
        .map_err(|e| ZapError::Relay(e.to_string()))?;
    let (mut write, mut read) = socket.split();

    let message = serde_json::json!(["EVENT", event]).to_string();
    write
        .send(Message::Text(message))
        .await
        .map_err(|e| ZapError::Relay(e.to_string()))?;

    let outcome = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Ok(RelayMessage::Ok { event_id, accepted, message }) = RelayMessage::parse(&text) {
                    if event_id == event.id {
                        break if accepted {
                            Ok(())
                        } else {
                            Err(ZapError::Relay(format!("rejected: {}", message)))
                        };
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                break Err(ZapError::Relay("connection closed before OK".into()));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break Err(ZapError::Relay(e.to_string())),
        }
    };

    let _ = write.close().await;
    outcome
}
