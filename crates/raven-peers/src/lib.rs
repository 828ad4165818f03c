//! # raven-peers
//!
//! The Peer Registry (design spec §4.4): the active peer table keyed by
//! `peer_id`, including peer-id rotation handling when a known Noise
//! static key reappears under a new announce.
//!
//! ## Modules
//!
//! - [`registry`] — `PeerRegistry` and its CRUD/rotation operations.

pub mod registry;

/// Error types for peer registry operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// No peer with this `peer_id` is registered.
    #[error("peer not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, PeerError>;
