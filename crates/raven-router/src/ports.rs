//! `MeshPort`/`NostrPort`: the router's external transport boundaries
//! (design spec §4.11). `raven-router` never touches a BLE adapter or a
//! relay socket directly; a daemon wiring layer supplies concrete
//! implementations backed by `raven-session`/`raven-nostr`, while the
//! router's own tests exercise the mocks below.

use raven_types::{NoiseStaticPub, PeerId};

/// The mesh transport boundary: session state queries and send/handshake.
pub trait MeshPort: Send + Sync {
    /// True if an established Noise session exists for `peer_id`.
    fn is_established(&self, peer_id: &PeerId) -> bool;

    /// True if the peer has been seen (announce/advertisement) recently
    /// enough to attempt a handshake, even without an established session.
    fn is_known(&self, peer_id: &PeerId) -> bool;

    /// Begin a Noise handshake toward `peer_id`. Idempotent: calling this
    /// while a handshake is already in flight is a no-op.
    fn initiate_handshake(&self, peer_id: &PeerId, noise_static_pub: &NoiseStaticPub) -> impl std::future::Future<Output = crate::Result<()>> + Send;

    /// Send already-encoded packet bytes over an established session.
    fn send(&self, peer_id: &PeerId, packet: &[u8]) -> impl std::future::Future<Output = crate::Result<()>> + Send;
}

/// The Nostr transport boundary: gift-wrapped DM delivery.
pub trait NostrPort: Send + Sync {
    /// Gift-wrap and publish `packet` as a DM addressed to `pubkey_hex`
    /// (a hex-encoded x-only secp256k1 public key).
    fn send_dm(&self, pubkey_hex: &str, packet: &[u8]) -> impl std::future::Future<Output = crate::Result<()>> + Send;
}

#[cfg(test)]
pub use mock::{MockMeshPort, MockNostrPort};
