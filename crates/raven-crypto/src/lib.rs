//! # raven-crypto
//!
//! Cryptographic primitives for the Raven mesh/Nostr protocol.
//!
//! No algorithm negotiation is permitted at this layer — each concern has
//! exactly one fixed suite, matching the wire formats the rest of the
//! workspace depends on.
//!
//! ## Modules
//!
//! - [`ed25519`] — mesh identity and packet signing (RFC 8032)
//! - [`x25519`] — Noise static/ephemeral key agreement (RFC 7748)
//! - [`noise`] — Noise_XX_25519_ChaChaPoly_SHA256 handshake primitives
//! - [`sha256`] — fingerprint and packet-id hashing
//! - [`pbkdf2`] — channel password key derivation
//! - [`aesgcm`] — channel message AEAD
//! - [`secp`] — secp256k1/BIP-340 Nostr identities (NIP-01)

pub mod aesgcm;
pub mod ed25519;
pub mod noise;
pub mod pbkdf2;
pub mod secp;
pub mod sha256;
pub mod x25519;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    SignatureVerification,

    /// AEAD decryption failed (authentication tag mismatch).
    #[error("AEAD decryption failed")]
    AeadDecryption,

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Noise handshake error.
    #[error("noise handshake error: {0}")]
    Noise(String),

    /// secp256k1/Nostr identity error.
    #[error("secp256k1 error: {0}")]
    Secp(String),

    /// Invalid input data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
