//! Nostr identity derivation (design spec §4.10).
//!
//! Two kinds of identity share one device master secret:
//!
//! - The **main** identity, used for favorite-peer gift-wrapped DMs, derived
//!   from the master secret alone.
//! - A **per-geohash** identity, used when posting to or reading a geohash
//!   channel, derived from the master secret and the geohash string so that
//!   geohash-channel activity cannot be linked to the main identity or to
//!   activity in a different geohash.
//!
//! Both derivations are HMAC-SHA256 over a domain-separated context,
//! matching the fixed-suite, no-negotiation posture of `raven-crypto`.

use hmac::{Hmac, Mac};
use raven_crypto::secp::NostrKeyPair;
use sha2::Sha256;

use crate::{NostrError, Result};

type HmacSha256 = Hmac<Sha256>;

const MAIN_IDENTITY_CONTEXT: &[u8] = b"raven-nostr/main-identity/v1";
const GEOHASH_IDENTITY_CONTEXT: &[u8] = b"raven-nostr/geohash-identity/v1";

fn derive_secret(master_secret: &[u8; 32], context: &[u8], label: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(master_secret).expect("HMAC accepts any key length");
    mac.update(context);
    mac.update(label);
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Derive the main Nostr identity from the device master secret.
///
/// Used for favorite-peer gift-wrapped DMs; stable for the life of the
/// device unless the master secret itself is rotated.
pub fn main_identity(master_secret: &[u8; 32]) -> Result<NostrKeyPair> {
    let secret = derive_secret(master_secret, MAIN_IDENTITY_CONTEXT, b"");
    NostrKeyPair::from_bytes(&secret).map_err(|e| NostrError::Crypto(e.to_string()))
}

/// Derive the Nostr identity used for a specific geohash channel.
///
/// Distinct geohash strings (and the main identity) yield unlinkable
/// keypairs; the same geohash always yields the same keypair for a given
/// master secret.
pub fn geohash_identity(master_secret: &[u8; 32], geohash: &str) -> Result<NostrKeyPair> {
    if geohash.is_empty() {
        return Err(NostrError::InvalidGeohash("geohash must not be empty".into()));
    }
    let secret = derive_secret(master_secret, GEOHASH_IDENTITY_CONTEXT, geohash.as_bytes());
    NostrKeyPair::from_bytes(&secret).map_err(|e| NostrError::Crypto(e.to_string()))
}
