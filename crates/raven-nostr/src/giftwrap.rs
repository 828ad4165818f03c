//! NIP-17 gift-wrapped DMs (design spec §4.10).
//!
//! Three layers, innermost first:
//!
//! - **Rumor** — the unsigned event carrying the actual payload, a
//!   `"bitchat1:" || base64url(packet_bytes)` string wrapping a mesh packet.
//! - **Seal** (kind 13) — the rumor, AEAD-encrypted and signed by the
//!   sender's real identity, so the recipient can authenticate the sender.
//! - **Gift wrap** (kind 1059) — the seal, AEAD-encrypted again under a
//!   fresh ephemeral identity and signed by that ephemeral key, so relays
//!   and onlookers never see the real sender's pubkey.
//!
//! Both encryption layers use an ECDH-derived conversation key, hashed with
//! SHA-256 rather than full NIP-44 HKDF — a simplification recorded as an
//! open design decision, since this transport has its own outer framing
//! (the mesh packet bytes) and doesn't need NIP-44's padding scheme.

use base64::Engine;
use raven_crypto::aesgcm;
use raven_crypto::secp::NostrKeyPair;
use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};

use crate::event::{self, NostrEvent, KIND_GIFT_WRAP, KIND_SEAL};
use crate::{NostrError, Result};

/// Rumor kind: a direct message wrapping a mesh packet.
pub const KIND_RUMOR_DM: u32 = 14;

/// Rumors older than this (by their `created_at`) are dropped on unwrap.
pub const STALE_AFTER_MS: u64 = 48 * 60 * 60 * 1000 + 15 * 60 * 1000;

const PACKET_PREFIX: &str = "bitchat1:";

fn b64_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn b64_decode(s: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| NostrError::GiftWrap(format!("base64 decode error: {e}")))
}

fn parse_xonly(pubkey_hex: &str) -> Result<XOnlyPublicKey> {
    let bytes = hex::decode(pubkey_hex).map_err(|e| NostrError::GiftWrap(e.to_string()))?;
    XOnlyPublicKey::from_slice(&bytes).map_err(|e| NostrError::GiftWrap(format!("bad pubkey: {e}")))
}

fn conversation_key(local: &NostrKeyPair, remote: &XOnlyPublicKey) -> [u8; 32] {
    let shared = local.ecdh_shared_secret(remote);
    raven_crypto::sha256::hash(&shared)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Rumor {
    pubkey: String,
    created_at: u64,
    kind: u32,
    tags: Vec<Vec<String>>,
    content: String,
}

/// Wrap `packet_bytes` as a NIP-17 gift-wrap event addressed to
/// `recipient_pubkey_hex`. `now_ms` becomes the `created_at` of every layer
/// (epoch seconds, per NIP-01); callers that want NIP-17's usual timestamp
/// jitter for metadata privacy should pre-randomize it before calling.
pub fn wrap_packet(
    sender_identity: &NostrKeyPair,
    recipient_pubkey_hex: &str,
    packet_bytes: &[u8],
    now_ms: u64,
) -> Result<NostrEvent> {
    let created_at = now_ms / 1000;
    let recipient = parse_xonly(recipient_pubkey_hex)?;
    let content = format!("{PACKET_PREFIX}{}", b64_encode(packet_bytes));

    let rumor = Rumor {
        pubkey: sender_identity.pubkey_hex(),
        created_at,
        kind: KIND_RUMOR_DM,
        tags: vec![vec!["p".to_string(), recipient_pubkey_hex.to_string()]],
        content,
    };
    let rumor_bytes =
        serde_json::to_vec(&rumor).map_err(|e| NostrError::GiftWrap(e.to_string()))?;

    let seal_key = conversation_key(sender_identity, &recipient);
    let seal_ciphertext = aesgcm::encrypt(&seal_key, &rumor_bytes)
        .map_err(|e| NostrError::Crypto(e.to_string()))?;
    let seal_event =
        event::build_event(sender_identity, created_at, KIND_SEAL, vec![], b64_encode(&seal_ciphertext))?;

    let ephemeral = NostrKeyPair::generate();
    let wrap_key = conversation_key(&ephemeral, &recipient);
    let seal_bytes =
        serde_json::to_vec(&seal_event).map_err(|e| NostrError::GiftWrap(e.to_string()))?;
    let wrap_ciphertext =
        aesgcm::encrypt(&wrap_key, &seal_bytes).map_err(|e| NostrError::Crypto(e.to_string()))?;

    event::build_event(
        &ephemeral,
        created_at,
        KIND_GIFT_WRAP,
        vec![vec!["p".to_string(), recipient_pubkey_hex.to_string()]],
        b64_encode(&wrap_ciphertext),
    )
}

/// Unwrap a gift-wrap event addressed to `recipient_identity`, returning the
/// enclosed mesh packet bytes. Verifies every layer's signature, checks
/// that the seal's claimed sender matches what it signed, and drops rumors
/// older than [`STALE_AFTER_MS`].
pub fn unwrap_packet(
    recipient_identity: &NostrKeyPair,
    wrap_event: &NostrEvent,
    now_ms: u64,
) -> Result<Vec<u8>> {
    if wrap_event.kind != KIND_GIFT_WRAP {
        return Err(NostrError::GiftWrap(format!("expected kind {KIND_GIFT_WRAP}, got {}", wrap_event.kind)));
    }
    event::verify_event(wrap_event)?;

    let ephemeral_pubkey = parse_xonly(&wrap_event.pubkey)?;
    let wrap_key = conversation_key(recipient_identity, &ephemeral_pubkey);
    let wrap_ciphertext = b64_decode(&wrap_event.content)?;
    let seal_bytes =
        aesgcm::decrypt(&wrap_key, &wrap_ciphertext).map_err(|e| NostrError::Crypto(e.to_string()))?;
    let seal_event: NostrEvent =
        serde_json::from_slice(&seal_bytes).map_err(|e| NostrError::GiftWrap(e.to_string()))?;

    if seal_event.kind != KIND_SEAL {
        return Err(NostrError::GiftWrap(format!("expected kind {KIND_SEAL}, got {}", seal_event.kind)));
    }
    event::verify_event(&seal_event)?;

    let sender_pubkey = parse_xonly(&seal_event.pubkey)?;
    let seal_key = conversation_key(recipient_identity, &sender_pubkey);
    let seal_ciphertext = b64_decode(&seal_event.content)?;
    let rumor_bytes =
        aesgcm::decrypt(&seal_key, &seal_ciphertext).map_err(|e| NostrError::Crypto(e.to_string()))?;
    let rumor: Rumor =
        serde_json::from_slice(&rumor_bytes).map_err(|e| NostrError::GiftWrap(e.to_string()))?;

    if rumor.pubkey != seal_event.pubkey {
        return Err(NostrError::GiftWrap("rumor pubkey does not match seal signer".into()));
    }

    let rumor_age_ms = now_ms.saturating_sub(rumor.created_at.saturating_mul(1000));
    if rumor_age_ms > STALE_AFTER_MS {
        return Err(NostrError::GiftWrap(format!("rumor is {rumor_age_ms}ms old, stale after {STALE_AFTER_MS}ms")));
    }

    let b64 = rumor
        .content
        .strip_prefix(PACKET_PREFIX)
        .ok_or_else(|| NostrError::GiftWrap("content missing bitchat1: prefix".into()))?;
    b64_decode(b64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_roundtrip() {
        let sender = NostrKeyPair::from_bytes(&[1u8; 32]).expect("sender");
        let recipient = NostrKeyPair::from_bytes(&[2u8; 32]).expect("recipient");
        let packet_bytes = b"mesh packet payload".to_vec();

        let wrap = wrap_packet(&sender, &recipient.pubkey_hex(), &packet_bytes, 10_000_000).expect("wrap");
        let unwrapped = unwrap_packet(&recipient, &wrap, 10_000_000).expect("unwrap");
        assert_eq!(unwrapped, packet_bytes);
    }

    #[test]
    fn gift_wrap_pubkey_is_not_the_sender() {
        let sender = NostrKeyPair::from_bytes(&[1u8; 32]).expect("sender");
        let recipient = NostrKeyPair::from_bytes(&[2u8; 32]).expect("recipient");
        let wrap = wrap_packet(&sender, &recipient.pubkey_hex(), b"hi", 10_000_000).expect("wrap");
        assert_ne!(wrap.pubkey, sender.pubkey_hex());
    }

    #[test]
    fn wrong_recipient_cannot_unwrap() {
        let sender = NostrKeyPair::from_bytes(&[1u8; 32]).expect("sender");
        let recipient = NostrKeyPair::from_bytes(&[2u8; 32]).expect("recipient");
        let bystander = NostrKeyPair::from_bytes(&[3u8; 32]).expect("bystander");
        let wrap = wrap_packet(&sender, &recipient.pubkey_hex(), b"hi", 10_000_000).expect("wrap");
        assert!(unwrap_packet(&bystander, &wrap, 10_000_000).is_err());
    }

    #[test]
    fn stale_rumor_is_rejected() {
        let sender = NostrKeyPair::from_bytes(&[1u8; 32]).expect("sender");
        let recipient = NostrKeyPair::from_bytes(&[2u8; 32]).expect("recipient");
        let wrap = wrap_packet(&sender, &recipient.pubkey_hex(), b"hi", 0).expect("wrap");
        assert!(unwrap_packet(&recipient, &wrap, STALE_AFTER_MS + 1_000).is_err());
    }

    #[test]
    fn tampered_gift_wrap_signature_fails() {
        let sender = NostrKeyPair::from_bytes(&[1u8; 32]).expect("sender");
        let recipient = NostrKeyPair::from_bytes(&[2u8; 32]).expect("recipient");
        let mut wrap = wrap_packet(&sender, &recipient.pubkey_hex(), b"hi", 10_000_000).expect("wrap");
        wrap.sig = hex::encode([0u8; 64]);
        assert!(unwrap_packet(&recipient, &wrap, 10_000_000).is_err());
    }
}
