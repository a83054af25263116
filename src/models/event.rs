use crate::error::{Result, ZapError};
use secp256k1::{schnorr::Signature, Message, XOnlyPublicKey, SECP256K1};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const TEXT_NOTE_KIND: u32 = 1;
pub const ZAP_REQUEST_KIND: u32 = 9734;
pub const ZAP_RECEIPT_KIND: u32 = 9735;

/// A signed NIP-01 event. Zap requests (kind 9734) and zap receipts
/// (kind 9735) are both carried in this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NostrEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl NostrEvent {
    pub fn find_tag(&self, name: &str) -> Option<&[String]> {
        self.tags
            .iter()
            .find(|tag| tag.first().map(String::as_str) == Some(name))
            .map(Vec::as_slice)
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.find_tag(name).is_some()
    }

    /// Value (second element) of the first tag named `name`.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.find_tag(name)
            .and_then(|tag| tag.get(1))
            .map(String::as_str)
    }

    /// The zap request embedded in a receipt's `description` tag.
    pub fn description(&self) -> Option<Result<ZapDescription>> {
        self.tag_value("description")
            .map(|raw| serde_json::from_str(raw).map_err(ZapError::from))
    }

    /// Checks that `id` is the hash of the event body and that `sig` is a
    /// valid BIP-340 signature over it by `pubkey`.
    pub fn verify(&self) -> Result<()> {
        let expected = event_hash(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content)?;
        if hex::encode(expected) != self.id {
            return Err(ZapError::Validation(format!("event id mismatch for {}", self.id)));
        }

        let pubkey_bytes = hex::decode(&self.pubkey)
            .map_err(|e| ZapError::Validation(format!("invalid pubkey hex: {}", e)))?;
        let pubkey = XOnlyPublicKey::from_slice(&pubkey_bytes)
            .map_err(|e| ZapError::Validation(format!("invalid pubkey: {}", e)))?;
        let sig_bytes = hex::decode(&self.sig)
            .map_err(|e| ZapError::Validation(format!("invalid signature hex: {}", e)))?;
        let sig = Signature::from_slice(&sig_bytes)
            .map_err(|e| ZapError::Validation(format!("invalid signature: {}", e)))?;

        SECP256K1
            .verify_schnorr(&sig, &Message::from_digest(expected), &pubkey)
            .map_err(|e| ZapError::Validation(format!("bad signature on {}: {}", self.id, e)))
    }
}

/// An event that has not been hashed or signed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEvent {
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

impl UnsignedEvent {
    pub fn id(&self) -> Result<[u8; 32]> {
        event_hash(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content)
    }
}

fn event_hash(
    pubkey: &str,
    created_at: u64,
    kind: u32,
    tags: &[Vec<String>],
    content: &str,
) -> Result<[u8; 32]> {
    let serialized = serde_json::to_string(&serde_json::json!([0, pubkey, created_at, kind, tags, content]))?;
    Ok(Sha256::digest(serialized.as_bytes()).into())
}

/// Fields of a zap request we read back out of a receipt description or a
/// ledger memo. Everything is optional because both sources are untrusted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ZapDescription {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub pubkey: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Subscription filter (NIP-01 `REQ`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    #[serde(rename = "#e", skip_serializing_if = "Vec::is_empty")]
    pub event_refs: Vec<String>,
}

impl Filter {
    /// Receipts referencing `event_id`, starting 60s before `now`.
    pub fn zap_receipts_for(event_id: &str, now: u64) -> Self {
        Self {
            kinds: vec![ZAP_RECEIPT_KIND],
            since: Some(now.saturating_sub(60)),
            event_refs: vec![event_id.to_string()],
        }
    }
}

/// Messages a relay sends to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Event { subscription_id: String, event: NostrEvent },
    Ok { event_id: String, accepted: bool, message: String },
    EndOfStoredEvents(String),
    Closed { subscription_id: String, message: String },
    Notice(String),
}

impl RelayMessage {
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let items = value
            .as_array()
            .ok_or_else(|| ZapError::Relay("relay message is not an array".into()))?;
        let label = items.first().and_then(Value::as_str).unwrap_or_default();
        let text_at = |i: usize| items.get(i).and_then(Value::as_str).unwrap_or_default().to_string();

        match label {
            "EVENT" => {
                let event = items
                    .get(2)
                    .cloned()
                    .ok_or_else(|| ZapError::Relay("EVENT without payload".into()))?;
                Ok(RelayMessage::Event {
                    subscription_id: text_at(1),
                    event: serde_json::from_value(event)?,
                })
            }
            "OK" => Ok(RelayMessage::Ok {
                event_id: text_at(1),
                accepted: items.get(2).and_then(Value::as_bool).unwrap_or(false),
                message: text_at(3),
            }),
            "EOSE" => Ok(RelayMessage::EndOfStoredEvents(text_at(1))),
            "CLOSED" => Ok(RelayMessage::Closed {
                subscription_id: text_at(1),
                message: text_at(2),
            }),
            "NOTICE" => Ok(RelayMessage::Notice(text_at(1))),
            other => Err(ZapError::Relay(format!("unknown relay message: {}", other))),
        }
    }
}
