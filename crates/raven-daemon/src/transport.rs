//! Transport adapters actually wired into the running daemon.
//!
//! `raven-ble` and `raven-nostr` define the [`raven_ble::adapter::BleAdapter`]
//! and [`raven_nostr::relay::RelayClient`] traits as the boundary a
//! platform integration implements, but ship no concrete implementation
//! of either — there is no Bluetooth radio or WebSocket client in this
//! workspace. [`UnavailableBleAdapter`] and [`UnavailableRelayClient`] are
//! that boundary's honest null object: every call fails, which the
//! [`raven_ble::manager::ConnectionManager`]/[`raven_nostr::relay::RelayManager`]
//! wrapping them already know how to treat as a transport-down condition
//! (design spec §7 degraded mode), rather than leaving those fully-built
//! collaborators uninstantiated.

use raven_ble::adapter::BleAdapter;
use raven_ble::power::DutyCycle;
use raven_ble::{BleError, Result as BleResult};
use raven_nostr::{NostrError, Result as NostrResult};

/// A `BleAdapter` with no radio behind it. Every operation reports
/// itself as a platform failure, which a real integration would reserve
/// for e.g. the OS denying Bluetooth permission.
pub struct UnavailableBleAdapter;

impl UnavailableBleAdapter {
    fn unavailable() -> BleError {
        BleError::Adapter("no BLE adapter bound to this process".to_string())
    }
}

impl BleAdapter for UnavailableBleAdapter {
    async fn start_advertising(&self) -> BleResult<()> {
        Err(Self::unavailable())
    }

    async fn stop_advertising(&self) -> BleResult<()> {
        Ok(())
    }

    async fn start_scanning(&self, _duty_cycle: DutyCycle) -> BleResult<()> {
        Err(Self::unavailable())
    }

    async fn stop_scanning(&self) -> BleResult<()> {
        Ok(())
    }

    async fn connect(&self, _address: &str) -> BleResult<u64> {
        Err(Self::unavailable())
    }

    async fn disconnect(&self, _address: &str) -> BleResult<()> {
        Ok(())
    }

    async fn write(&self, address: &str, _data: &[u8]) -> BleResult<()> {
        Err(BleError::PeerUnreachable(address.to_string()))
    }
}

/// A `RelayClient` with no WebSocket behind it.
pub struct UnavailableRelayClient;

impl UnavailableRelayClient {
    fn unavailable(url: &str) -> NostrError {
        NostrError::Relay(format!("no WebSocket client bound to this process ({url})"))
    }
}

impl raven_nostr::relay::RelayClient for UnavailableRelayClient {
    async fn connect(&self, url: &str) -> NostrResult<()> {
        Err(Self::unavailable(url))
    }

    async fn disconnect(&self, _url: &str) -> NostrResult<()> {
        Ok(())
    }

    async fn publish(&self, url: &str, _event: &raven_nostr::event::NostrEvent) -> NostrResult<()> {
        Err(Self::unavailable(url))
    }

    async fn subscribe(&self, url: &str, _sub_id: &str, _filter_json: &str) -> NostrResult<()> {
        Err(Self::unavailable(url))
    }

    async fn unsubscribe(&self, _url: &str, _sub_id: &str) -> NostrResult<()> {
        Ok(())
    }
}
