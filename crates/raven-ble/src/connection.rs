//! Connection table and cap enforcement (design spec §4.5 "Connection table", "Caps").

use std::collections::HashMap;

use raven_types::PeerId;

/// A device address, as exposed by the platform's BLE stack.
pub type DeviceAddress = String;

/// One entry per connected device.
#[derive(Clone, Debug)]
pub struct ConnectionEntry {
    pub address: DeviceAddress,
    /// `true` if we connected out to this device as GATT central;
    /// `false` if it connected to us as GATT peripheral.
    pub is_client: bool,
    pub connected_at_ms: u64,
    pub rssi: Option<i16>,
    /// Opaque platform handle for this GATT connection.
    pub gatt_handle: u64,
    /// Negotiated MTU, if the platform has reported one yet.
    pub mtu: Option<usize>,
}

/// Configurable caps on simultaneous connections.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ConnectionCaps {
    pub max_overall: usize,
    pub max_client: usize,
    pub max_server: usize,
}

impl Default for ConnectionCaps {
    fn default() -> Self {
        Self { max_overall: 20, max_client: 10, max_server: 10 }
    }
}

/// Tracks live connections and the address→peer binding made on first
/// announce over each connection.
#[derive(Default)]
pub struct ConnectionTable {
    entries: HashMap<DeviceAddress, ConnectionEntry>,
    /// Address → peer_id, bound the moment a first announce is seen on
    /// that connection; dropped on disconnect.
    address_to_peer: HashMap<DeviceAddress, PeerId>,
    caps: ConnectionCaps,
}

impl ConnectionTable {
    pub fn new(caps: ConnectionCaps) -> Self {
        Self { entries: HashMap::new(), address_to_peer: HashMap::new(), caps }
    }

    pub fn caps(&self) -> ConnectionCaps {
        self.caps
    }

    pub fn insert(&mut self, entry: ConnectionEntry) {
        self.entries.insert(entry.address.clone(), entry);
    }

    pub fn get(&self, address: &str) -> Option<&ConnectionEntry> {
        self.entries.get(address)
    }

    pub fn update_rssi(&mut self, address: &str, rssi: i16) {
        if let Some(entry) = self.entries.get_mut(address) {
            entry.rssi = Some(rssi);
        }
    }

    pub fn update_mtu(&mut self, address: &str, mtu: usize) {
        if let Some(entry) = self.entries.get_mut(address) {
            entry.mtu = Some(mtu);
        }
    }

    /// Bind a peer to this address on first announce, marking it a
    /// "direct" connection. No-op for an unknown address.
    pub fn bind_peer(&mut self, address: &str, peer_id: PeerId) {
        if self.entries.contains_key(address) {
            self.address_to_peer.insert(address.to_string(), peer_id);
        }
    }

    /// Drop a connection. Returns the peer_id it was bound to, if any, and
    /// whether that peer now has zero remaining direct addresses.
    pub fn disconnect(&mut self, address: &str) -> Option<(PeerId, bool)> {
        self.entries.remove(address);
        let peer_id = self.address_to_peer.remove(address)?;
        let still_direct = self.address_to_peer.values().any(|p| *p == peer_id);
        Some((peer_id, !still_direct))
    }

    /// All addresses currently bound to `peer_id`, direct client links first.
    pub fn addresses_for_peer(&self, peer_id: &PeerId) -> Vec<DeviceAddress> {
        let mut addrs: Vec<DeviceAddress> = self
            .address_to_peer
            .iter()
            .filter(|(_, p)| *p == peer_id)
            .map(|(addr, _)| addr.clone())
            .collect();
        addrs.sort_by_key(|addr| {
            let is_client = self.entries.get(addr).map(|e| e.is_client).unwrap_or(false);
            std::cmp::Reverse(is_client)
        });
        addrs
    }

    pub fn client_addresses(&self) -> Vec<DeviceAddress> {
        self.entries.values().filter(|e| e.is_client).map(|e| e.address.clone()).collect()
    }

    pub fn server_addresses(&self) -> Vec<DeviceAddress> {
        self.entries.values().filter(|e| !e.is_client).map(|e| e.address.clone()).collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &ConnectionEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Determine which client connections must be disconnected to fit
    /// under the configured caps, oldest first.
    pub fn overflow_client_addresses(&self) -> Vec<DeviceAddress> {
        let over_overall = self.entries.len().saturating_sub(self.caps.max_overall);
        let client_count = self.entries.values().filter(|e| e.is_client).count();
        let over_client = client_count.saturating_sub(self.caps.max_client);
        let to_drop = over_overall.max(over_client).min(client_count);

        if to_drop == 0 {
            return Vec::new();
        }

        let mut clients: Vec<&ConnectionEntry> = self.entries.values().filter(|e| e.is_client).collect();
        clients.sort_by_key(|e| e.connected_at_ms);
        clients.into_iter().take(to_drop).map(|e| e.address.clone()).collect()
    }
}
