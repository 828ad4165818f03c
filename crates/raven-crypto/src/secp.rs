//! secp256k1 / BIP-340 Schnorr identities for Nostr (NIP-01).
//!
//! Nostr event ids and signatures use secp256k1 x-only public keys, distinct
//! from the mesh's Ed25519/X25519 identity. A per-geohash identity is an
//! independent keypair derived from the device master secret and the
//! geohash string (see `raven-nostr`); this module only wraps the
//! underlying primitive.

use secp256k1::ecdh::SharedSecret;
use secp256k1::{schnorr, Keypair, Message, Parity, Secp256k1, SecretKey, XOnlyPublicKey};

use crate::{CryptoError, Result};

/// A Nostr identity keypair (NIP-01 `privkey`/`pubkey`).
pub struct NostrKeyPair {
    keypair: Keypair,
}

impl NostrKeyPair {
    /// Build a keypair from a 32-byte secret.
    pub fn from_bytes(secret: &[u8; 32]) -> Result<Self> {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(secret).map_err(|e| CryptoError::Secp(e.to_string()))?;
        Ok(Self {
            keypair: Keypair::from_secret_key(&secp, &sk),
        })
    }

    /// Generate a random keypair.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        Self {
            keypair: Keypair::new(&secp, &mut rand::thread_rng()),
        }
    }

    /// The 32-byte x-only public key, hex-encoded, used as a Nostr `pubkey`.
    pub fn pubkey_hex(&self) -> String {
        hex::encode(self.x_only_public_key().serialize())
    }

    pub fn x_only_public_key(&self) -> XOnlyPublicKey {
        self.keypair.x_only_public_key().0
    }

    /// Sign a NIP-01 event id (the SHA-256 digest of the serialized event).
    pub fn sign_event_id(&self, event_id: &[u8; 32]) -> schnorr::Signature {
        let secp = Secp256k1::new();
        let msg = Message::from_digest(*event_id);
        secp.sign_schnorr(&msg, &self.keypair)
    }

    /// Derive an ECDH shared secret with `their_pubkey`, for NIP-17 gift-wrap
    /// conversation keys. `their_pubkey` is treated as even-parity, matching
    /// the NIP-44 convention of reconstructing a full point from an x-only
    /// key. Returns the raw shared x-coordinate digest; callers hash this
    /// again to derive message/nonce keys rather than using it directly.
    pub fn ecdh_shared_secret(&self, their_pubkey: &XOnlyPublicKey) -> [u8; 32] {
        let secret_key = self.keypair.secret_key();
        let full_pubkey = their_pubkey.public_key(Parity::Even);
        let shared = SharedSecret::new(&full_pubkey, &secret_key);
        let mut out = [0u8; 32];
        out.copy_from_slice(shared.as_ref());
        out
    }
}

/// Verify a BIP-340 Schnorr signature over a Nostr event id.
pub fn verify_event_signature(
    pubkey: &XOnlyPublicKey,
    event_id: &[u8; 32],
    signature: &schnorr::Signature,
) -> Result<()> {
    let secp = Secp256k1::new();
    let msg = Message::from_digest(*event_id);
    secp.verify_schnorr(signature, &msg, pubkey)
        .map_err(|_| CryptoError::SignatureVerification)
}
