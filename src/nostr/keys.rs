use crate::error::{Result, ZapError};
use crate::models::{NostrEvent, UnsignedEvent};
use bech32::{Bech32, Hrp};
use secp256k1::{Keypair, Message, SecretKey, SECP256K1};
use std::fmt;

// NIP-19 TLV types used by `nevent`
const TLV_SPECIAL: u8 = 0;
const TLV_RELAY: u8 = 1;
const TLV_AUTHOR: u8 = 2;
const TLV_KIND: u8 = 3;

/// Signing identity.
#[derive(Clone)]
pub struct Keys {
    keypair: Keypair,
}

impl Keys {
    pub fn generate() -> Self {
        Self {
            keypair: Keypair::new(SECP256K1, &mut rand::thread_rng()),
        }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| ZapError::Key(format!("Invalid secret key: {}", e)))?;
        Ok(Self {
            keypair: Keypair::from_secret_key(SECP256K1, &secret),
        })
    }

    pub fn from_nsec(nsec: &str) -> Result<Self> {
        Self::from_secret_bytes(&decode_nsec(nsec)?)
    }

    /// x-only public key, hex encoded.
    pub fn public_key_hex(&self) -> String {
        let (xonly, _parity) = self.keypair.x_only_public_key();
        hex::encode(xonly.serialize())
    }

    pub fn npub(&self) -> Result<String> {
        encode_npub(&self.public_key_hex())
    }

    pub fn sign(&self, unsigned: UnsignedEvent) -> Result<NostrEvent> {
        let id = unsigned.id()?;
        let aux: [u8; 32] = rand::random();
        let sig = SECP256K1.sign_schnorr_with_aux_rand(&Message::from_digest(id), &self.keypair, &aux);

        Ok(NostrEvent {
            id: hex::encode(id),
            pubkey: unsigned.pubkey,
            created_at: unsigned.created_at,
            kind: unsigned.kind,
            tags: unsigned.tags,
            content: unsigned.content,
            sig: sig.to_string(),
        })
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

pub fn decode_nsec(nsec: &str) -> Result<Vec<u8>> {
    if !nsec.starts_with("nsec1") {
        return Err(ZapError::Key("Invalid nsec format. Must start with nsec1".into()));
    }

    let data = decode_bech32("nsec", nsec)?;
    if data.len() != 32 {
        return Err(ZapError::Key(format!("Invalid nsec key: expected 32 bytes, got {}", data.len())));
    }
    Ok(data)
}

pub fn encode_npub(pubkey_hex: &str) -> Result<String> {
    let bytes = decode_hex32(pubkey_hex)?;
    encode_bech32("npub", &bytes)
}

/// `nevent1…` pointer carrying the event id, relay hints, author and kind.
pub fn encode_nevent(event: &NostrEvent, relays: &[String]) -> Result<String> {
    let mut tlv = Vec::new();
    push_tlv(&mut tlv, TLV_SPECIAL, &decode_hex32(&event.id)?)?;
    for relay in relays {
        push_tlv(&mut tlv, TLV_RELAY, relay.as_bytes())?;
    }
    push_tlv(&mut tlv, TLV_AUTHOR, &decode_hex32(&event.pubkey)?)?;
    push_tlv(&mut tlv, TLV_KIND, &event.kind.to_be_bytes())?;

    encode_bech32("nevent", &tlv)
}

fn push_tlv(out: &mut Vec<u8>, kind: u8, value: &[u8]) -> Result<()> {
    let len = u8::try_from(value.len())
        .map_err(|_| ZapError::Key(format!("TLV value too long: {} bytes", value.len())))?;
    out.push(kind);
    out.push(len);
    out.extend_from_slice(value);
    Ok(())
}

fn decode_hex32(value: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(value).map_err(|e| ZapError::Key(format!("Invalid hex: {}", e)))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| ZapError::Key(format!("Expected 32 bytes, got {}", b.len())))
}

fn encode_bech32(hrp: &str, data: &[u8]) -> Result<String> {
    let hrp = Hrp::parse(hrp).map_err(|e| ZapError::Key(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, data).map_err(|e| ZapError::Key(e.to_string()))
}

fn decode_bech32(expected_hrp: &str, encoded: &str) -> Result<Vec<u8>> {
    let (hrp, data) = bech32::decode(encoded).map_err(|e| ZapError::Key(e.to_string()))?;
    if hrp.as_str() != expected_hrp {
        return Err(ZapError::Key(format!(
            "Expected {} key, got {}",
            expected_hrp,
            hrp.as_str()
        )));
    }
    Ok(data)
}
