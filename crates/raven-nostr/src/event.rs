//! NIP-01 event construction, canonical id, and signing (design spec §4.10).

use raven_crypto::secp::{verify_event_signature, NostrKeyPair};
use secp256k1::{schnorr, XOnlyPublicKey};
use serde::{Deserialize, Serialize};

use crate::{NostrError, Result};

/// Kind-20000 ephemeral events used for geohash location notes and
/// real-time channel messages (design spec §4.10).
pub const KIND_GEOHASH_EPHEMERAL: u32 = 20_000;

/// Kind used by NIP-17 gift-wrap events (the outer, publicly-visible layer).
pub const KIND_GIFT_WRAP: u32 = 1059;

/// Kind used by NIP-17 sealed rumors (the middle, encrypted-once layer).
pub const KIND_SEAL: u32 = 13;

/// A NIP-01 event. `id` and `sig` are hex-encoded; `pubkey` is the x-only
/// public key, hex-encoded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NostrEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

/// The canonical NIP-01 serialization used to compute an event id:
/// `[0, pubkey, created_at, kind, tags, content]`, compact JSON, no
/// surrounding whitespace.
fn canonical_bytes(
    pubkey_hex: &str,
    created_at: u64,
    kind: u32,
    tags: &[Vec<String>],
    content: &str,
) -> Result<Vec<u8>> {
    let value = (0u8, pubkey_hex, created_at, kind, tags, content);
    serde_json::to_vec(&value).map_err(|e| NostrError::InvalidEvent(e.to_string()))
}

/// Compute a NIP-01 event id: the SHA-256 digest of the canonical
/// serialization.
pub fn compute_id(
    pubkey_hex: &str,
    created_at: u64,
    kind: u32,
    tags: &[Vec<String>],
    content: &str,
) -> Result<[u8; 32]> {
    let bytes = canonical_bytes(pubkey_hex, created_at, kind, tags, content)?;
    Ok(raven_crypto::sha256::hash(&bytes))
}

/// Build and sign a new event with `keypair`.
pub fn build_event(
    keypair: &NostrKeyPair,
    created_at: u64,
    kind: u32,
    tags: Vec<Vec<String>>,
    content: String,
) -> Result<NostrEvent> {
    let pubkey_hex = keypair.pubkey_hex();
    let id = compute_id(&pubkey_hex, created_at, kind, &tags, &content)?;
    let sig = keypair.sign_event_id(&id);
    Ok(NostrEvent {
        id: hex::encode(id),
        pubkey: pubkey_hex,
        created_at,
        kind,
        tags,
        content,
        sig: hex::encode(sig.as_ref().to_vec()),
    })
}

/// Verify an event: its id matches its canonical serialization, and its
/// signature verifies against its claimed pubkey.
pub fn verify_event(event: &NostrEvent) -> Result<()> {
    let expected_id =
        compute_id(&event.pubkey, event.created_at, event.kind, &event.tags, &event.content)?;
    let expected_id_hex = hex::encode(expected_id);
    if expected_id_hex != event.id {
        return Err(NostrError::InvalidEvent(format!(
            "id mismatch: claimed {}, computed {}",
            event.id, expected_id_hex
        )));
    }

    let id_bytes: [u8; 32] = expected_id;
    let pubkey_bytes =
        hex::decode(&event.pubkey).map_err(|e| NostrError::InvalidEvent(e.to_string()))?;
    let xonly = XOnlyPublicKey::from_slice(&pubkey_bytes)
        .map_err(|e| NostrError::InvalidEvent(format!("bad pubkey: {e}")))?;
    let sig_bytes = hex::decode(&event.sig).map_err(|e| NostrError::InvalidEvent(e.to_string()))?;
    let sig = schnorr::Signature::from_slice(&sig_bytes)
        .map_err(|e| NostrError::InvalidEvent(format!("bad signature: {e}")))?;

    verify_event_signature(&xonly, &id_bytes, &sig)
        .map_err(|_| NostrError::InvalidEvent("signature verification failed".into()))
}

/// Find the first value of a single-letter tag (e.g. `"g"`, `"n"`), if present.
pub fn tag_value<'a>(event: &'a NostrEvent, name: &str) -> Option<&'a str> {
    event
        .tags
        .iter()
        .find(|tag| tag.first().map(|t| t.as_str()) == Some(name))
        .and_then(|tag| tag.get(1))
        .map(|s| s.as_str())
}
