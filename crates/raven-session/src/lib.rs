//! # raven-session
//!
//! The mesh Security Core (design spec §4.3): the per-peer Noise XX
//! handshake state machine and the inbound duplicate-packet filter.
//!
//! ## Modules
//!
//! - [`handshake`] — `UNINITIALIZED`/`HANDSHAKING`/`ESTABLISHED`/`FAILED`
//!   session state machine built on [`raven_crypto::noise`].
//! - [`dedup`] — bounded, TTL'd duplicate-packet detector.
//! - [`dispatch`] — `process_inbound`: the ingress decision point that
//!   composes the two above (self-sent/duplicate drop, ttl/relay).

pub mod dedup;
pub mod dispatch;
pub mod handshake;

/// Error types for Security Core operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No established session exists for this peer.
    #[error("no established session")]
    NoSession,

    /// Decryption failed (authentication tag mismatch, or no session).
    #[error("decrypt failed")]
    DecryptFail,

    /// The Noise handshake failed and the session was reset to FAILED.
    #[error("handshake failed: {0}")]
    HandshakeFail(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
