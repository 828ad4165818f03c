//! SHA-256 hashing for fingerprints and packet/event identifiers.
//!
//! `fingerprint = sha256(noise_static_pub)` and `peer_id = fingerprint[..8]`
//! (see `raven-types::peer_id_from_fingerprint`). This module is also used
//! for the Nostr PoW event-id digest (see [`crate::secp`]).

use sha2::{Digest, Sha256};

/// Hash arbitrary bytes with SHA-256.
pub fn hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Count the number of leading zero bits in a digest, used to evaluate
/// Nostr PoW (NIP-13) difficulty against a mined event id.
pub fn leading_zero_bits(digest: &[u8; 32]) -> u32 {
    let mut count = 0;
    for byte in digest {
        if *byte == 0 {
            count += 8;
            continue;
        }
        count += byte.leading_zeros();
        break;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash(b"raven"), hash(b"raven"));
        assert_ne!(hash(b"raven"), hash(b"raven2"));
    }

    #[test]
    fn leading_zero_bits_all_zero() {
        assert_eq!(leading_zero_bits(&[0u8; 32]), 256);
    }

    #[test]
    fn leading_zero_bits_first_bit_set() {
        let mut digest = [0u8; 32];
        digest[0] = 0b1000_0000;
        assert_eq!(leading_zero_bits(&digest), 0);
    }

    #[test]
    fn leading_zero_bits_counts_across_bytes() {
        let mut digest = [0u8; 32];
        digest[0] = 0;
        digest[1] = 0b0010_0000;
        assert_eq!(leading_zero_bits(&digest), 10);
    }
}
