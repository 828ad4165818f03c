//! `MessageRouter`: path selection between the mesh and Nostr transports
//! (design spec §4.11).
//!
//! The choice function, in priority order:
//!
//! 1. An established mesh session for the peer → send directly over mesh.
//! 2. A known-but-not-established mesh peer → initiate a handshake and
//!    queue the packet in the outbox, flushed on `on_session_established`.
//! 3. No mesh path, but a mutual favorite with a known Nostr identity →
//!    send as a gift-wrapped Nostr DM.
//! 4. None of the above → [`RouterError::Unreachable`] once
//!    [`DEFAULT_UNREACHABLE_TIMEOUT_MS`] has elapsed since the first
//!    attempt at this destination; until then, the packet stays queued
//!    in case a path appears (an announce arrives, a favorite turns
//!    mutual) before the deadline.

use crate::favorites::FavoritesIndex;
use crate::outbox::{OutboxKey, OutboxPort};
use crate::ports::{MeshPort, NostrPort};
use crate::{Result, RouterError};
use raven_types::{NoiseStaticPub, PeerId};
use std::collections::HashMap;

/// How long a destination with no available path is kept pending before
/// routing gives up and reports [`RouterError::Unreachable`].
pub const DEFAULT_UNREACHABLE_TIMEOUT_MS: u64 = 10_000;

/// Where a message is headed. Resolved by the caller (typically from a
/// conversation's known identity) before it reaches the router.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    /// A peer addressable on the mesh, identified both by its current
    /// (rotating) `PeerId` and its stable Noise static public key.
    MeshPeer { peer_id: PeerId, noise_static_pub_hex: String },
    /// A peer reachable only via Nostr: geohash channel aliases and
    /// mutual-favorite DMs both resolve to this once a pubkey is known.
    NostrAlias { nostr_pubkey_hex: String },
}

/// What routing decided to do with a packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Sent immediately over an established mesh session.
    SentMesh,
    /// No mesh session yet; handshake initiated and packet queued.
    QueuedForHandshake,
    /// Sent immediately as a Nostr DM.
    SentNostr,
    /// No path yet; packet remains pending, not yet past the timeout.
    Pending,
}

fn parse_noise_static_pub(hex_str: &str) -> Option<NoiseStaticPub> {
    let bytes = hex::decode(hex_str).ok()?;
    bytes.try_into().ok()
}

/// Routes outgoing packets to the mesh or Nostr transport, and owns the
/// store-and-forward outbox and the pending-destination timeout clock.
pub struct MessageRouter<M: MeshPort, N: NostrPort, O: OutboxPort> {
    mesh: M,
    nostr: N,
    outbox: O,
    favorites: FavoritesIndex,
    first_attempt_ms: HashMap<Destination, u64>,
}

impl<M: MeshPort, N: NostrPort, O: OutboxPort> MessageRouter<M, N, O> {
    pub fn new(mesh: M, nostr: N, outbox: O, favorites: FavoritesIndex) -> Self {
        Self {
            mesh,
            nostr,
            outbox,
            favorites,
            first_attempt_ms: HashMap::new(),
        }
    }

    /// Give back the favorites index for mutation (recording favorite
    /// state changes, binding rotated peer ids).
    pub fn favorites_mut(&mut self) -> &mut FavoritesIndex {
        &mut self.favorites
    }

    /// Route `packet` toward `destination`.
    pub async fn route(&mut self, destination: Destination, packet: Vec<u8>, now_ms: u64) -> Result<RouteOutcome> {
        match &destination {
            Destination::MeshPeer { peer_id, noise_static_pub_hex } => {
                if self.mesh.is_established(peer_id) {
                    self.first_attempt_ms.remove(&destination);
                    self.mesh
                        .send(peer_id, &packet)
                        .await
                        .map_err(|e| RouterError::Mesh(format!("{e}")))?;
                    return Ok(RouteOutcome::SentMesh);
                }

                if self.mesh.is_known(peer_id) {
                    self.first_attempt_ms.remove(&destination);
                    let noise_static_pub = parse_noise_static_pub(noise_static_pub_hex)
                        .ok_or_else(|| RouterError::Mesh("malformed noise static pub".into()))?;
                    self.mesh
                        .initiate_handshake(peer_id, &noise_static_pub)
                        .await
                        .map_err(|e| RouterError::Mesh(format!("{e}")))?;
                    self.outbox.enqueue(
                        OutboxKey { peer_id: *peer_id, noise_static_pub_hex: noise_static_pub_hex.clone() },
                        packet,
                        now_ms,
                    );
                    return Ok(RouteOutcome::QueuedForHandshake);
                }

                if self.favorites.is_mutual(peer_id) {
                    if let Some(nostr_pubkey_hex) = self.favorites.get_by_peer(peer_id).and_then(|r| r.nostr_npub_hex.clone()) {
                        self.first_attempt_ms.remove(&destination);
                        self.nostr
                            .send_dm(&nostr_pubkey_hex, &packet)
                            .await
                            .map_err(|e| RouterError::Nostr(format!("{e}")))?;
                        return Ok(RouteOutcome::SentNostr);
                    }
                }

                self.pend_or_timeout(destination, now_ms)
            }
            Destination::NostrAlias { nostr_pubkey_hex } => {
                self.first_attempt_ms.remove(&destination);
                self.nostr
                    .send_dm(nostr_pubkey_hex, &packet)
                    .await
                    .map_err(|e| RouterError::Nostr(format!("{e}")))?;
                Ok(RouteOutcome::SentNostr)
            }
        }
    }

    fn pend_or_timeout(&mut self, destination: Destination, now_ms: u64) -> Result<RouteOutcome> {
        let first_seen = *self.first_attempt_ms.entry(destination.clone()).or_insert(now_ms);
        if now_ms.saturating_sub(first_seen) >= DEFAULT_UNREACHABLE_TIMEOUT_MS {
            self.first_attempt_ms.remove(&destination);
            return Err(RouterError::Unreachable);
        }
        Ok(RouteOutcome::Pending)
    }

    /// Flush any packets queued for `peer_id` once its Noise session has
    /// been established (design spec §4.11, `ON_SESSION_ESTABLISHED`).
    pub async fn on_session_established(&mut self, peer_id: &PeerId, noise_static_pub_hex: &str) -> Result<usize> {
        let key = OutboxKey { peer_id: *peer_id, noise_static_pub_hex: noise_static_pub_hex.to_string() };
        let entries = self.outbox.drain(&key);
        let count = entries.len();
        for entry in entries {
            self.mesh
                .send(peer_id, &entry.packet)
                .await
                .map_err(|e| RouterError::Mesh(format!("{e}")))?;
        }
        Ok(count)
    }

    /// Drop outbox entries older than their TTL across all recipients.
    pub fn prune_outbox(&mut self, now_ms: u64) {
        self.outbox.prune_expired(now_ms);
    }
}
