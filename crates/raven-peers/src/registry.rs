//! `PeerRegistry`: the active peer table keyed by `peer_id` (design spec §4.4).

use std::collections::HashMap;

use raven_types::peer::Peer;
use raven_types::{peer_id_from_fingerprint, Fingerprint, NoiseStaticPub, PeerId, SigningPub};

/// Outcome of processing an announce through [`PeerRegistry::handle_announce`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// No prior record for this `noise_static_pub` existed.
    New,
    /// The existing record for this `peer_id` was updated in place.
    Updated,
    /// The `noise_static_pub` was already known under a different
    /// `peer_id`; the record migrated to the new id.
    Rotated { old_id: PeerId },
}

/// The active peer table.
#[derive(Default)]
pub struct PeerRegistry {
    by_peer_id: HashMap<PeerId, Peer>,
    /// Index from Noise static key to the peer_id currently holding it,
    /// used to detect peer-id rotation on announce.
    by_noise_pub: HashMap<NoiseStaticPub, PeerId>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a bare peer record if one doesn't exist yet (e.g. first
    /// contact before any keys are known). Returns `true` if a new record
    /// was created.
    pub fn add_or_update(&mut self, peer_id: PeerId, nickname: &str, now_ms: u64) -> bool {
        if let Some(peer) = self.by_peer_id.get_mut(&peer_id) {
            peer.nickname = nickname.to_string();
            peer.last_seen = now_ms;
            false
        } else {
            let peer = Peer::new(peer_id, nickname.to_string(), [0u8; 32], [0u8; 32], [0u8; 32], now_ms);
            self.by_peer_id.insert(peer_id, peer);
            true
        }
    }

    /// Update a peer's identity material. `verified` gates whether the
    /// Noise/signing keys are trusted to overwrite the existing record —
    /// an unverified claim only updates the nickname and last-seen time.
    /// Returns `true` if any field changed.
    pub fn update_info(
        &mut self,
        peer_id: PeerId,
        nickname: &str,
        noise_pub: NoiseStaticPub,
        signing_pub: SigningPub,
        verified: bool,
        now_ms: u64,
    ) -> bool {
        let fingerprint = raven_crypto::sha256::hash(&noise_pub);
        let peer = self
            .by_peer_id
            .entry(peer_id)
            .or_insert_with(|| Peer::new(peer_id, nickname.to_string(), noise_pub, signing_pub, fingerprint, now_ms));

        let mut changed = peer.nickname != nickname;
        peer.nickname = nickname.to_string();
        peer.last_seen = now_ms;

        if verified {
            changed |= peer.noise_static_pub != noise_pub || peer.signing_pub != signing_pub;
            peer.noise_static_pub = noise_pub;
            peer.signing_pub = signing_pub;
            peer.fingerprint = fingerprint;
            self.by_noise_pub.insert(noise_pub, peer_id);
        }

        changed
    }

    /// Process an `ANNOUNCE`, handling peer-id rotation: if `noise_pub` is
    /// already bound to a different `peer_id`, migrate the record over
    /// (carrying forward nickname and fingerprint) and drop the old entry.
    pub fn handle_announce(
        &mut self,
        peer_id: PeerId,
        nickname: &str,
        noise_pub: NoiseStaticPub,
        signing_pub: SigningPub,
        now_ms: u64,
    ) -> AnnounceOutcome {
        let fingerprint = raven_crypto::sha256::hash(&noise_pub);
        debug_assert_eq!(peer_id_from_fingerprint(&fingerprint), peer_id);

        match self.by_noise_pub.get(&noise_pub).copied() {
            Some(old_id) if old_id != peer_id => {
                let mut peer = self.by_peer_id.remove(&old_id).unwrap_or_else(|| {
                    Peer::new(old_id, nickname.to_string(), noise_pub, signing_pub, fingerprint, now_ms)
                });
                peer.peer_id = peer_id;
                peer.noise_static_pub = noise_pub;
                peer.signing_pub = signing_pub;
                peer.fingerprint = fingerprint;
                peer.last_seen = now_ms;
                self.by_peer_id.insert(peer_id, peer);
                self.by_noise_pub.insert(noise_pub, peer_id);
                AnnounceOutcome::Rotated { old_id }
            }
            Some(_) => {
                self.update_info(peer_id, nickname, noise_pub, signing_pub, true, now_ms);
                AnnounceOutcome::Updated
            }
            None => {
                self.update_info(peer_id, nickname, noise_pub, signing_pub, true, now_ms);
                AnnounceOutcome::New
            }
        }
    }

    pub fn set_direct(&mut self, peer_id: &PeerId, is_direct: bool) {
        if let Some(peer) = self.by_peer_id.get_mut(peer_id) {
            peer.is_direct = is_direct;
        }
    }

    pub fn update_rssi(&mut self, peer_id: &PeerId, rssi: i16) {
        if let Some(peer) = self.by_peer_id.get_mut(peer_id) {
            peer.rssi = Some(rssi);
        }
    }

    pub fn remove(&mut self, peer_id: &PeerId) -> Option<Peer> {
        let peer = self.by_peer_id.remove(peer_id)?;
        self.by_noise_pub.remove(&peer.noise_static_pub);
        Some(peer)
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&Peer> {
        self.by_peer_id.get(peer_id)
    }

    pub fn all_active(&self) -> impl Iterator<Item = &Peer> {
        self.by_peer_id.values()
    }

    /// Record that we've announced under `our_peer_id` to this peer.
    /// Returns `true` the first time (the caller should send its own
    /// announce back); `false` on every subsequent call, so a peer that
    /// keeps re-announcing doesn't get re-announced back to forever.
    pub fn mark_announced_to(&mut self, peer_id: &PeerId, our_peer_id: PeerId) -> bool {
        match self.by_peer_id.get_mut(peer_id) {
            Some(peer) => peer.announced_to.insert(our_peer_id),
            None => false,
        }
    }

    /// Compute and store the SHA-256 fingerprint for a peer's Noise public
    /// key, returning its lowercase hex form.
    pub fn store_fingerprint(&mut self, peer_id: PeerId, pubkey: NoiseStaticPub) -> String {
        let fingerprint: Fingerprint = raven_crypto::sha256::hash(&pubkey);
        if let Some(peer) = self.by_peer_id.get_mut(&peer_id) {
            peer.fingerprint = fingerprint;
        }
        self.by_noise_pub.insert(pubkey, peer_id);
        raven_types::fingerprint_hex(&fingerprint)
    }
}
