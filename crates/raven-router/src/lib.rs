//! # raven-router
//!
//! The Message Router (design spec §4.11): chooses mesh vs. Nostr delivery
//! per destination, owns the per-peer store-and-forward outbox (§4.8) and
//! the favorites/identity index (§4.12). `MeshPort`, `NostrPort` and
//! `OutboxPort` are injected at construction so the router itself never
//! talks to BLE, relay sockets, or a database directly.
//!
//! ## Modules
//!
//! - [`ports`] — `MeshPort`/`NostrPort`: the router's external collaborators.
//! - [`outbox`] — per-recipient store-and-forward queue and `OutboxPort`.
//! - [`favorites`] — favorite relationships and the peer/npub identity index.
//! - [`router`] — `MessageRouter`: the path-selection logic itself.

pub mod favorites;
pub mod outbox;
pub mod ports;
pub mod router;

/// Error types for message routing.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Neither a mesh session nor a Nostr fallback is available for this
    /// destination, and the reachability timeout has elapsed.
    #[error("destination unreachable")]
    Unreachable,

    /// The mesh transport collaborator failed.
    #[error("mesh error: {0}")]
    Mesh(String),

    /// The Nostr transport collaborator failed.
    #[error("nostr error: {0}")]
    Nostr(String),

    /// The outbox rejected an enqueue (should not happen with the default
    /// in-memory implementation, which always evicts to make room).
    #[error("outbox error: {0}")]
    Outbox(String),
}

pub type Result<T> = std::result::Result<T, RouterError>;
