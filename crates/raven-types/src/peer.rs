//! Peer table entries (design spec §3 "Peer").

use serde::{Deserialize, Serialize};

use crate::{Fingerprint, NoiseStaticPub, PeerId, SigningPub};

/// A known peer, active or offline-but-favorited.
///
/// Invariants: `peer_id == first_8_bytes(fingerprint)`;
/// `fingerprint == sha256(noise_static_pub)`. A peer with no established
/// session or pending handshake may still exist in the registry, e.g. an
/// offline favorite indexed only by its noise key hex.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Peer {
    pub peer_id: PeerId,
    pub nickname: String,
    pub noise_static_pub: NoiseStaticPub,
    pub signing_pub: SigningPub,
    pub fingerprint: Fingerprint,
    /// Monotonic last-seen timestamp (ms), per [`crate::ClockSource`].
    pub last_seen: u64,
    /// RSSI in dBm, keyed by device address at the BLE layer; the
    /// registry holds the strongest/most recent sample.
    pub rssi: Option<i16>,
    /// True once we've received this peer's first announce over at
    /// least one live BLE connection.
    pub is_direct: bool,
    /// Peers we have sent our own announcement to directly.
    pub announced_to: std::collections::HashSet<PeerId>,
}

impl Peer {
    pub fn new(peer_id: PeerId, nickname: String, noise_static_pub: NoiseStaticPub, signing_pub: SigningPub, fingerprint: Fingerprint, last_seen: u64) -> Self {
        Self {
            peer_id,
            nickname,
            noise_static_pub,
            signing_pub,
            fingerprint,
            last_seen,
            rssi: None,
            is_direct: false,
            announced_to: std::collections::HashSet::new(),
        }
    }

    pub fn fingerprint_hex(&self) -> String {
        crate::fingerprint_hex(&self.fingerprint)
    }

    pub fn noise_static_pub_hex(&self) -> String {
        hex::encode(self.noise_static_pub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_matches_fingerprint_prefix() {
        let fp: Fingerprint = [0x11; 32];
        let id = crate::peer_id_from_fingerprint(&fp);
        let peer = Peer::new(id, "alice".into(), [0; 32], [0; 32], fp, 0);
        assert_eq!(peer.peer_id, fp[..8]);
    }
}
