//! # raven-nostr
//!
//! The Nostr transport (design spec §4.10): long-range reachability for
//! favorited peers and location-tagged geohash channels, layered over
//! secp256k1/BIP-340 identities distinct from the mesh's Ed25519/X25519
//! identity.
//!
//! ## Modules
//!
//! - [`identity`] — main and per-geohash Nostr identity derivation.
//! - [`event`] — NIP-01 event construction, canonical id, sign/verify.
//! - [`pow`] — NIP-13 proof-of-work mining and verification.
//! - [`geohash`] — base32 geohash encode/decode and neighbor calculation.
//! - [`giftwrap`] — NIP-17 rumor/seal/giftwrap DM wrapping of mesh packets.
//! - [`relay`] — `RelayClient` trait, connection state machine, subscriptions.

pub mod event;
pub mod geohash;
pub mod giftwrap;
pub mod identity;
pub mod pow;
pub mod relay;

/// Error types for Nostr transport operations.
#[derive(Debug, thiserror::Error)]
pub enum NostrError {
    /// A cryptographic primitive failed (identity derivation, ECDH, AEAD).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// An event's signature did not verify, or its id did not match its
    /// canonical serialization.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// A gift-wrapped DM failed to unwrap (malformed layer, bad seal).
    #[error("gift wrap error: {0}")]
    GiftWrap(String),

    /// A received event's PoW did not meet the configured minimum difficulty.
    #[error("insufficient proof of work: got {got}, need {need}")]
    InsufficientPow { got: u32, need: u32 },

    /// A geohash string was malformed or out of precision range.
    #[error("invalid geohash: {0}")]
    InvalidGeohash(String),

    /// Relay connection or protocol error; the connection may be retried.
    #[error("relay error: {0}")]
    Relay(String),

    /// DNS resolution for a relay URL failed. Terminal — retrying a relay
    /// whose hostname doesn't resolve just wastes the backoff budget.
    #[error("relay DNS resolution failed for {0}")]
    RelayDns(String),
}

pub type Result<T> = std::result::Result<T, NostrError>;
