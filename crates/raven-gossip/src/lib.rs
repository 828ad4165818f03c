//! # raven-gossip
//!
//! Gossip Sync (design spec §4.9): a bounded LRU of recently observed
//! public packet hashes, a Golomb-coded set (GCS) filter summarizing that
//! seen set for reconciliation with directly connected peers, and the
//! REQUEST_SYNC scheduling/rate-limiting policy around both.
//!
//! ## Modules
//!
//! - [`seen`] — `SeenSet`, the bounded LRU of observed public packet hashes.
//! - [`gcs`] — Golomb-Rice coded set encoder/decoder and membership test.
//! - [`sync`] — `SyncScheduler`: periodic/initial sync timing and per-peer
//!   REQUEST_SYNC rate limiting.

pub mod gcs;
pub mod seen;
pub mod sync;

/// Error types for gossip sync operations.
#[derive(Debug, thiserror::Error)]
pub enum GossipError {
    /// A GCS filter's encoded byte budget was exceeded before all values
    /// could be encoded.
    #[error("GCS filter exceeds byte budget of {budget} bytes")]
    FilterTooLarge { budget: usize },

    /// Malformed GCS filter bytes.
    #[error("malformed GCS filter: {0}")]
    MalformedFilter(String),
}

pub type Result<T> = std::result::Result<T, GossipError>;
