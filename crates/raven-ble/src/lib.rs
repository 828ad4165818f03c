//! # raven-ble
//!
//! The BLE Connection Manager (design spec §4.5): runs both GATT roles
//! simultaneously (peripheral advertising + central scanning), tracks one
//! connection entry per device address, binds addresses to peers on first
//! announce, enforces connection caps, and drives scan duty cycle from a
//! [`power::PowerManager`] mode.
//!
//! `raven-ble` never talks to real Bluetooth hardware: the [`adapter::BleAdapter`]
//! trait is the boundary a platform integration implements, and a
//! `MockBleAdapter` test double exercises the manager's logic in isolation.
//!
//! ## Modules
//!
//! - [`adapter`] — `BleAdapter` trait, the external GATT I/O boundary.
//! - [`connection`] — `ConnectionTable`, cap enforcement, address→peer binding.
//! - [`power`] — `PowerManager` and its mode table.
//! - [`manager`] — `ConnectionManager`, wiring the above together with retry/backoff.

pub mod adapter;
pub mod connection;
pub mod manager;
pub mod power;

/// Error types for BLE connection management.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// No connection entry exists for this device address.
    #[error("no connection for address {0}")]
    NoConnection(String),

    /// No address is currently bound to this peer.
    #[error("peer not reachable: {0}")]
    PeerUnreachable(String),

    /// The underlying adapter reported a failure.
    #[error("adapter error: {0}")]
    Adapter(String),

    /// A payload exceeds the negotiated MTU and was not fragmented first.
    #[error("payload of {len} bytes exceeds negotiated MTU {mtu}")]
    ExceedsMtu { len: usize, mtu: usize },
}

pub type Result<T> = std::result::Result<T, BleError>;
