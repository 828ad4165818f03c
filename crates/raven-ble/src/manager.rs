//! `ConnectionManager`: wires the connection table and power manager to a
//! [`BleAdapter`], and drives per-address connection retry with backoff
//! (design spec §4.5 "Retries").

use std::collections::HashMap;

use raven_types::PeerId;
use tracing::debug;

use crate::adapter::BleAdapter;
use crate::connection::{ConnectionCaps, ConnectionEntry, ConnectionTable, DeviceAddress};
use crate::power::{PowerManager, PowerMode};
use crate::{BleError, Result};

/// Delay before the first retry of a failed connection attempt.
pub const CONNECTION_RETRY_DELAY_MS: u64 = 2_000;

/// Give up on a device address after this many consecutive failures.
pub const MAX_CONNECTION_ATTEMPTS: u32 = 5;

#[derive(Clone, Debug)]
struct RetryState {
    attempts: u32,
    last_attempt_ms: u64,
}

/// Tracks per-address retry state and decides when the next attempt is due.
#[derive(Default)]
struct RetryTracker {
    state: HashMap<DeviceAddress, RetryState>,
}

impl RetryTracker {
    fn backoff_ms(attempts: u32) -> u64 {
        CONNECTION_RETRY_DELAY_MS.saturating_mul(1u64 << attempts.min(6))
    }

    fn record_failure(&mut self, address: &str, now_ms: u64) {
        let entry = self.state.entry(address.to_string()).or_insert(RetryState { attempts: 0, last_attempt_ms: now_ms });
        entry.attempts += 1;
        entry.last_attempt_ms = now_ms;
    }

    fn record_success(&mut self, address: &str) {
        self.state.remove(address);
    }

    /// Whether a reconnect attempt against `address` is due at `now_ms`.
    /// An address past [`MAX_CONNECTION_ATTEMPTS`] is only retried again
    /// once its entry has expired (2x the retry window with no attempts).
    fn should_attempt(&self, address: &str, now_ms: u64) -> bool {
        match self.state.get(address) {
            None => true,
            Some(retry) => {
                let due_at = retry.last_attempt_ms + Self::backoff_ms(retry.attempts);
                if retry.attempts >= MAX_CONNECTION_ATTEMPTS {
                    let expires_at = retry.last_attempt_ms + 2 * Self::backoff_ms(retry.attempts);
                    now_ms >= expires_at
                } else {
                    now_ms >= due_at
                }
            }
        }
    }

    /// Drop retry entries whose expiry (2x the retry window) has passed,
    /// resetting their attempt counter.
    fn evict_expired(&mut self, now_ms: u64) {
        self.state.retain(|_, retry| {
            let expires_at = retry.last_attempt_ms + 2 * Self::backoff_ms(retry.attempts);
            now_ms < expires_at
        });
    }
}

/// Drives both GATT roles, the connection table, cap enforcement and
/// retry/backoff, against a concrete [`BleAdapter`].
pub struct ConnectionManager<A: BleAdapter> {
    adapter: A,
    table: ConnectionTable,
    power: PowerManager,
    retries: RetryTracker,
    next_gatt_handle: u64,
}

impl<A: BleAdapter> ConnectionManager<A> {
    pub fn new(adapter: A, caps: ConnectionCaps) -> Self {
        Self {
            adapter,
            table: ConnectionTable::new(caps),
            power: PowerManager::default(),
            retries: RetryTracker::default(),
            next_gatt_handle: 1,
        }
    }

    pub fn table(&self) -> &ConnectionTable {
        &self.table
    }

    pub fn power_mode(&self) -> PowerMode {
        self.power.mode()
    }

    /// Switch power mode, restarting scanning only if the duty cycle
    /// policy actually changed.
    pub async fn set_power_mode(&mut self, mode: PowerMode) -> Result<()> {
        if self.power.transition(mode) {
            self.adapter.stop_scanning().await?;
            self.adapter.start_scanning(self.power.duty_cycle()).await?;
        }
        Ok(())
    }

    pub async fn start(&mut self) -> Result<()> {
        self.adapter.start_advertising().await?;
        self.adapter.start_scanning(self.power.duty_cycle()).await?;
        Ok(())
    }

    /// Attempt to connect to a discovered device, respecting backoff.
    /// Returns `Ok(false)` if no attempt was due yet.
    pub async fn connect(&mut self, address: &str, now_ms: u64) -> Result<bool> {
        if !self.retries.should_attempt(address, now_ms) {
            return Ok(false);
        }

        match self.adapter.connect(address).await {
            Ok(handle) => {
                self.retries.record_success(address);
                self.table.insert(ConnectionEntry {
                    address: address.to_string(),
                    is_client: true,
                    connected_at_ms: now_ms,
                    rssi: None,
                    gatt_handle: handle,
                    mtu: None,
                });
                self.enforce_caps(now_ms).await?;
                Ok(true)
            }
            Err(err) => {
                debug!(address = %address, error = %err, "connection attempt failed");
                self.retries.record_failure(address, now_ms);
                Err(err)
            }
        }
    }

    /// Record an inbound server-side connection (the remote device
    /// connected to us as peripheral client).
    pub fn accept_server_connection(&mut self, address: &str, now_ms: u64) {
        let handle = self.next_gatt_handle;
        self.next_gatt_handle += 1;
        self.table.insert(ConnectionEntry {
            address: address.to_string(),
            is_client: false,
            connected_at_ms: now_ms,
            rssi: None,
            gatt_handle: handle,
            mtu: None,
        });
    }

    /// Bind the peer_id learned from a first announce on `address`.
    pub fn bind_peer(&mut self, address: &str, peer_id: PeerId) {
        self.table.bind_peer(address, peer_id);
    }

    pub async fn disconnect(&mut self, address: &str) -> Result<()> {
        self.adapter.disconnect(address).await?;
        self.table.disconnect(address);
        Ok(())
    }

    pub fn update_rssi(&mut self, address: &str, rssi: i16) {
        self.table.update_rssi(address, rssi);
    }

    /// Write `data` to every connected device (both GATT client writes and
    /// server notifications).
    pub async fn broadcast(&self, data: &[u8]) -> Result<()> {
        for entry in self.table.all() {
            self.adapter.write(&entry.address, data).await?;
        }
        Ok(())
    }

    /// Write `data` to one address bound to `peer_id`, preferring a
    /// direct client link.
    pub async fn send_to_peer(&self, peer_id: &PeerId, data: &[u8]) -> Result<()> {
        let addresses = self.table.addresses_for_peer(peer_id);
        let address = addresses.first().ok_or_else(|| BleError::PeerUnreachable(hex::encode(peer_id)))?;
        self.adapter.write(address, data).await
    }

    /// Disconnect the oldest client connections to get back under caps,
    /// and evict retry entries past their expiry window.
    async fn enforce_caps(&mut self, now_ms: u64) -> Result<()> {
        for address in self.table.overflow_client_addresses() {
            debug!(address = %address, "disconnecting oldest client to stay under caps");
            self.adapter.disconnect(&address).await?;
            self.table.disconnect(&address);
        }
        self.retries.evict_expired(now_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MockBleAdapter;

    #[tokio::test]
    async fn connect_registers_a_client_connection() {
        let mut manager = ConnectionManager::new(MockBleAdapter::new(), ConnectionCaps::default());
        assert!(manager.connect("AA:BB", 0).await.unwrap());
        assert_eq!(manager.table().len(), 1);
    }

    #[tokio::test]
    async fn backoff_blocks_immediate_retry_after_failure() {
        struct FailingAdapter(MockBleAdapter);
        impl BleAdapter for FailingAdapter {
            async fn start_advertising(&self) -> Result<()> {
                self.0.start_advertising().await
            }
            async fn stop_advertising(&self) -> Result<()> {
                self.0.stop_advertising().await
            }
            async fn start_scanning(&self, duty_cycle: crate::power::DutyCycle) -> Result<()> {
                self.0.start_scanning(duty_cycle).await
            }
            async fn stop_scanning(&self) -> Result<()> {
                self.0.stop_scanning().await
            }
            async fn connect(&self, _address: &str) -> Result<u64> {
                Err(BleError::Adapter("simulated failure".into()))
            }
            async fn disconnect(&self, address: &str) -> Result<()> {
                self.0.disconnect(address).await
            }
            async fn write(&self, address: &str, data: &[u8]) -> Result<()> {
                self.0.write(address, data).await
            }
        }

        let mut manager = ConnectionManager::new(FailingAdapter(MockBleAdapter::new()), ConnectionCaps::default());
        assert!(manager.connect("AA:BB", 0).await.is_err());
        // Immediately retrying is not yet due.
        assert!(!manager.retries.should_attempt("AA:BB", 0));
        assert!(manager.retries.should_attempt("AA:BB", CONNECTION_RETRY_DELAY_MS * 2));
    }

    #[tokio::test]
    async fn power_mode_transition_restarts_scanning_only_on_change() {
        let mut manager = ConnectionManager::new(MockBleAdapter::new(), ConnectionCaps::default());
        manager.set_power_mode(PowerMode::Foreground).await.unwrap();
        manager.set_power_mode(PowerMode::Background).await.unwrap();
        assert_eq!(manager.power_mode(), PowerMode::Background);
    }

    #[tokio::test]
    async fn overflow_disconnects_oldest_client_when_over_cap() {
        let caps = ConnectionCaps { max_overall: 10, max_client: 1, max_server: 10 };
        let mut manager = ConnectionManager::new(MockBleAdapter::new(), caps);
        manager.connect("OLD", 0).await.unwrap();
        manager.connect("NEW", 100).await.unwrap();
        assert_eq!(manager.table().len(), 1);
        assert!(manager.table().get("NEW").is_some());
    }

    #[tokio::test]
    async fn send_to_peer_fails_when_unreachable() {
        let manager = ConnectionManager::new(MockBleAdapter::new(), ConnectionCaps::default());
        let result = manager.send_to_peer(&[9u8; 8], b"hi").await;
        assert!(matches!(result, Err(BleError::PeerUnreachable(_))));
    }
}
