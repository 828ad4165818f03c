//! # raven-types
//!
//! Shared domain types for the Raven mesh/Nostr chat overlay. These
//! structures correspond 1:1 with the data model section of the core
//! design specification: peers, packets, Noise payloads, sessions,
//! fragments, gossip seen-entries and favorite relationships.

pub mod clock;
pub mod events;
pub mod fragment;
pub mod intents;
pub mod packet;
pub mod payload;
pub mod peer;
pub mod session;

pub use clock::ClockSource;

/// 8-byte peer identifier: the hex-printable prefix of a peer's fingerprint.
pub type PeerId = [u8; 8];

/// SHA-256 digest of a peer's Noise static public key.
pub type Fingerprint = [u8; 32];

/// X25519 static public key bytes.
pub type NoiseStaticPub = [u8; 32];

/// Ed25519 verifying key bytes.
pub type SigningPub = [u8; 32];

/// Identifier for a fragmented transfer.
pub type TransferId = [u8; 16];

/// Sender-generated identifier for a private message, used for UI dedup.
pub type MessageId = [u8; 16];

/// Maximum hop count for a relayed packet.
pub const MAX_TTL: u8 = 7;

/// Broadcast recipient sentinel (all 0xFF).
pub const BROADCAST_RECIPIENT: PeerId = [0xFF; 8];

/// Render a [`PeerId`] as lowercase hex (16 chars).
pub fn peer_id_hex(id: &PeerId) -> String {
    hex::encode(id)
}

/// Render a [`Fingerprint`] as lowercase hex.
pub fn fingerprint_hex(fp: &Fingerprint) -> String {
    hex::encode(fp)
}

/// Derive the 8-byte peer id from a fingerprint: its first 8 bytes.
pub fn peer_id_from_fingerprint(fp: &Fingerprint) -> PeerId {
    let mut id = [0u8; 8];
    id.copy_from_slice(&fp[..8]);
    id
}
