//! Favorites and the peer/npub identity index (design spec §4.12).
//!
//! Favorite state is relationship-local, not global: each side tracks
//! whether *we* favorited a peer and whether *they* favorited us back, the
//! latter learned only from an out-of-band `[FAVORITED]`/`[UNFAVORITED]`
//! control message carried over an established session. Mutuality gates
//! the Nostr fallback path in [`crate::router::MessageRouter`] (design spec
//! §4.11: a non-mutual favorite never gets a long-range delivery attempt).

use raven_types::{NoiseStaticPub, PeerId};
use std::collections::HashMap;

/// One side's view of its relationship with a peer, keyed by that peer's
/// stable Noise static public key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FavoriteRelationship {
    pub we_favorite: bool,
    pub they_favorite: bool,
    /// The peer's Nostr main identity, hex-encoded x-only pubkey, learned
    /// via the same out-of-band exchange as favorite status. `None` until
    /// the peer has announced one.
    pub nostr_npub_hex: Option<String>,
}

impl FavoriteRelationship {
    /// Mutual favorites are the only relationship eligible for the Nostr
    /// long-range fallback (design spec §4.11).
    pub fn is_mutual(&self) -> bool {
        self.we_favorite && self.they_favorite
    }
}

/// Favorite relationships plus the secondary `peer_id -> noise_static_pub`
/// index needed because routing decisions arrive keyed by the peer's
/// current (rotating) `PeerId`, while favorite state is keyed by the
/// peer's stable static key.
#[derive(Default)]
pub struct FavoritesIndex {
    by_noise_pub: HashMap<String, FavoriteRelationship>,
    peer_to_noise_pub: HashMap<PeerId, String>,
}

impl FavoritesIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a peer's current `PeerId` with its stable static key.
    /// Called whenever a peer is identified (announce or session
    /// established), so favorite lookups by `PeerId` stay valid across a
    /// peer-ID rotation.
    pub fn bind_peer(&mut self, peer_id: PeerId, noise_static_pub: &NoiseStaticPub) {
        self.peer_to_noise_pub.insert(peer_id, hex::encode(noise_static_pub));
    }

    /// Record that we favorited `noise_static_pub_hex`.
    pub fn record_favorited(&mut self, noise_static_pub_hex: &str) {
        self.by_noise_pub.entry(noise_static_pub_hex.to_string()).or_default().we_favorite = true;
    }

    /// Record that we unfavorited `noise_static_pub_hex`.
    pub fn record_unfavorited(&mut self, noise_static_pub_hex: &str) {
        self.by_noise_pub.entry(noise_static_pub_hex.to_string()).or_default().we_favorite = false;
    }

    /// Record an incoming `[FAVORITED]` control message from a peer,
    /// optionally carrying their Nostr main identity.
    pub fn record_they_favorited(&mut self, noise_static_pub_hex: &str, nostr_npub_hex: Option<String>) {
        let relationship = self.by_noise_pub.entry(noise_static_pub_hex.to_string()).or_default();
        relationship.they_favorite = true;
        if nostr_npub_hex.is_some() {
            relationship.nostr_npub_hex = nostr_npub_hex;
        }
    }

    /// Record an incoming `[UNFAVORITED]` control message from a peer.
    pub fn record_they_unfavorited(&mut self, noise_static_pub_hex: &str) {
        self.by_noise_pub.entry(noise_static_pub_hex.to_string()).or_default().they_favorite = false;
    }

    /// Look up the relationship by stable static key.
    pub fn get(&self, noise_static_pub_hex: &str) -> Option<&FavoriteRelationship> {
        self.by_noise_pub.get(noise_static_pub_hex)
    }

    /// Look up the relationship by current `PeerId`, resolving through the
    /// static-key index first.
    pub fn get_by_peer(&self, peer_id: &PeerId) -> Option<&FavoriteRelationship> {
        let noise_static_pub_hex = self.peer_to_noise_pub.get(peer_id)?;
        self.get(noise_static_pub_hex)
    }

    /// True if the given peer is a mutual favorite with a known Nostr
    /// identity, i.e. eligible for the long-range fallback.
    pub fn is_mutual(&self, peer_id: &PeerId) -> bool {
        self.get_by_peer(peer_id).is_some_and(FavoriteRelationship::is_mutual)
    }
}
