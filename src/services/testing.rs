//! In-memory collaborators shared by the service tests.

use crate::client::{LedgerSource, RelayTransport};
use crate::error::{Result, ZapError};
use crate::models::{Filter, LedgerEntry, NostrEvent};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

pub(crate) fn entry(id: &str, preimage: &str, confirmed: bool, created: i64) -> LedgerEntry {
    LedgerEntry {
        id: id.into(),
        iid: None,
        hash: None,
        amount: 21,
        uid: None,
        rate: None,
        currency: None,
        memo: None,
        payment_hash: None,
        preimage: Some(preimage.into()),
        tip: None,
        payment_type: Some("lightning".into()),
        confirmed,
        created,
    }
}

#[derive(Clone)]
pub(crate) enum Reply {
    Entries(Vec<LedgerEntry>),
    Delayed(Duration, Vec<LedgerEntry>),
    Fail(fn() -> ZapError),
    Panic,
}

/// Ledger double that plays back a script of replies, repeating the last
/// one once the script runs out.
pub(crate) struct StaticLedger {
    script: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
    last_limit: Mutex<Option<usize>>,
}

impl StaticLedger {
    pub fn scripted(replies: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            last_limit: Mutex::new(None),
        }
    }

    pub fn with_entries(entries: Vec<LedgerEntry>) -> Self {
        Self::scripted(vec![Reply::Entries(entries)])
    }

    pub fn failing(error: fn() -> ZapError) -> Self {
        Self::scripted(vec![Reply::Fail(error)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_limit(&self) -> Option<usize> {
        *self.last_limit.lock().unwrap()
    }

    fn next_reply(&self) -> Reply {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or(Reply::Entries(Vec::new()))
        }
    }
}

#[async_trait]
impl LedgerSource for StaticLedger {
    async fn fetch_recent_entries(&self, _credential: &str, limit: usize) -> Result<Vec<LedgerEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_limit.lock().unwrap() = Some(limit);
        match self.next_reply() {
            Reply::Entries(entries) => Ok(entries),
            Reply::Delayed(delay, entries) => {
                tokio::time::sleep(delay).await;
                Ok(entries)
            }
            Reply::Fail(error) => Err(error()),
            Reply::Panic => panic!("ledger exploded"),
        }
    }
}

/// Relay double: tests push events through `sender()` and inspect which
/// lifecycle calls the subscriber made.
pub(crate) struct ChannelTransport {
    sender: Mutex<Option<mpsc::Sender<NostrEvent>>>,
    filters: Mutex<Vec<(String, Filter)>>,
    unsubscribes: AtomicUsize,
    shutdowns: Mutex<Vec<String>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(None),
            filters: Mutex::new(Vec::new()),
            unsubscribes: AtomicUsize::new(0),
            shutdowns: Mutex::new(Vec::new()),
        }
    }

    pub fn sender(&self) -> mpsc::Sender<NostrEvent> {
        self.sender.lock().unwrap().clone().expect("subscribe was not called")
    }

    pub fn filters(&self) -> Vec<(String, Filter)> {
        self.filters.lock().unwrap().clone()
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.lock().unwrap().len()
    }

    pub fn shutdown_ids(&self) -> Vec<String> {
        self.shutdowns.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayTransport for ChannelTransport {
    async fn subscribe(&self, subscription_id: &str, filter: Filter) -> Result<mpsc::Receiver<NostrEvent>> {
        let (tx, rx) = mpsc::channel(16);
        *self.sender.lock().unwrap() = Some(tx);
        self.filters.lock().unwrap().push((subscription_id.to_string(), filter));
        Ok(rx)
    }

    async fn unsubscribe(&self, _subscription_id: &str) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
    }

    async fn shutdown(&self, subscription_id: &str) {
        self.shutdowns.lock().unwrap().push(subscription_id.to_string());
    }

    async fn publish(&self, _event: &NostrEvent) -> Result<()> {
        Ok(())
    }
}
