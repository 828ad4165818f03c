//! `BleAdapter`: the external GATT central+peripheral boundary (design spec
//! §4.5 "a BLE adapter capable of GATT central+peripheral and scanning").
//!
//! `raven-ble` never talks to a real radio; a platform integration provides
//! a concrete `BleAdapter`, while the manager's own tests exercise the
//! [`MockBleAdapter`] below.

use crate::connection::DeviceAddress;
use crate::power::DutyCycle;
use crate::Result;

/// A discovered device advertising the mesh's GATT service.
#[derive(Clone, Debug)]
pub struct Discovered {
    pub address: DeviceAddress,
    pub rssi: i16,
}

/// The GATT I/O boundary the connection manager drives.
///
/// Implementors own the actual Bluetooth radio. All methods are
/// fallible since they cross a hardware boundary; the manager treats a
/// failure here as a connection-level retry trigger, not necessarily a
/// fatal error (see design spec §7 for the degraded-mode distinction).
pub trait BleAdapter: Send + Sync {
    /// Begin advertising the mesh GATT service as a peripheral.
    fn start_advertising(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Stop advertising.
    fn stop_advertising(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Begin scanning for the mesh GATT service as a central, applying the
    /// given duty cycle.
    fn start_scanning(&self, duty_cycle: DutyCycle) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Stop scanning.
    fn stop_scanning(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Connect to a discovered device as a GATT client, returning an
    /// opaque platform handle for the new connection.
    fn connect(&self, address: &str) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Tear down a connection, client or server side.
    fn disconnect(&self, address: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Write a packet's bytes to a connected device (client write or
    /// server notify, depending on role).
    fn write(&self, address: &str, data: &[u8]) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[cfg(test)]
pub use mock::MockBleAdapter;

#[cfg(test)]
mod mock {
    use super::*;
    use std::sync::Mutex;

    /// In-memory `BleAdapter` double: records calls instead of touching
    /// real hardware.
    #[derive(Default)]
    pub struct MockBleAdapter {
        pub writes: Mutex<Vec<(DeviceAddress, Vec<u8>)>>,
        pub connected: Mutex<Vec<DeviceAddress>>,
        pub advertising: Mutex<bool>,
        pub scanning: Mutex<Option<DutyCycle>>,
        next_handle: Mutex<u64>,
    }

    impl MockBleAdapter {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl BleAdapter for MockBleAdapter {
        async fn start_advertising(&self) -> Result<()> {
            *self.advertising.lock().unwrap() = true;
            Ok(())
        }

        async fn stop_advertising(&self) -> Result<()> {
            *self.advertising.lock().unwrap() = false;
            Ok(())
        }

        async fn start_scanning(&self, duty_cycle: DutyCycle) -> Result<()> {
            *self.scanning.lock().unwrap() = Some(duty_cycle);
            Ok(())
        }

        async fn stop_scanning(&self) -> Result<()> {
            *self.scanning.lock().unwrap() = None;
            Ok(())
        }

        async fn connect(&self, address: &str) -> Result<u64> {
            self.connected.lock().unwrap().push(address.to_string());
            let mut handle = self.next_handle.lock().unwrap();
            *handle += 1;
            Ok(*handle)
        }

        async fn disconnect(&self, address: &str) -> Result<()> {
            self.connected.lock().unwrap().retain(|a| a != address);
            Ok(())
        }

        async fn write(&self, address: &str, data: &[u8]) -> Result<()> {
            self.writes.lock().unwrap().push((address.to_string(), data.to_vec()));
            Ok(())
        }
    }
}
