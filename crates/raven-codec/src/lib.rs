//! # raven-codec
//!
//! Wire encoding for the Raven mesh protocol.
//!
//! - **Packet codec** ([`wire`]) — the fixed binary header plus
//!   length-prefixed payload and optional signature, and the canonical
//!   signing-bytes form.
//! - **Noise payload TLV codec** ([`payload`]) — CBOR-encoded TLV bodies
//!   carried inside a decrypted `NOISE_ENCRYPTED` packet.
//! - **CBOR helpers** ([`cbor`]) — thin [`ciborium`] wrappers shared by the
//!   above.
//! - **Fragmenter** ([`fragment`]) — splits oversized packets into
//!   `FRAGMENT`-type packets and reassembles them on the receive side.

pub mod cbor;
pub mod fragment;
pub mod payload;
pub mod wire;

/// Error type for codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The buffer ended before a declared field could be read.
    #[error("truncated packet")]
    Truncated,

    /// `version` byte did not match a known [`raven_types::packet::ProtocolVersion`].
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// `type` byte did not match a known [`raven_types::packet::PacketType`].
    #[error("unknown packet type {0}")]
    UnknownType(u8),

    /// Declared payload length exceeded the buffer or the configured maximum.
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// A `REQUEST_SYNC` or `FRAGMENT` reassembly buffer exceeded its deadline.
    #[error("reassembly timed out for transfer {0}")]
    ReassemblyTimeout(String),

    /// Two fragments declared the same index with different bytes.
    #[error("fragment overlap at index {0}")]
    FragmentOverlap(u16),

    /// Reassembled bytes did not match the fragment set's declared total size.
    #[error("fragment size mismatch")]
    SizeMismatch,

    /// CBOR serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// CBOR deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;
