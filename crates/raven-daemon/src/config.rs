//! Daemon configuration file handling (design spec §5 Configuration).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ble: BleConfig,
    #[serde(default)]
    pub gossip: GossipConfig,
    #[serde(default)]
    pub nostr: NostrConfig,
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// BLE Connection Manager caps (design spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BleConfig {
    #[serde(default = "default_max_overall")]
    pub max_overall: u32,
    #[serde(default = "default_max_client")]
    pub max_client: u32,
    #[serde(default = "default_max_server")]
    pub max_server: u32,
    /// Maximum payload bytes per GATT write before fragmentation kicks in.
    #[serde(default = "default_fragment_mtu")]
    pub fragment_mtu: usize,
}

/// Gossip Sync parameters (design spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipConfig {
    #[serde(default = "default_gossip_capacity")]
    pub capacity: usize,
    #[serde(default = "default_gossip_byte_budget")]
    pub byte_budget: usize,
    #[serde(default = "default_gossip_fpr")]
    pub false_positive_rate: f64,
    #[serde(default = "default_gossip_interval_ms")]
    pub interval_ms: u64,
}

/// Nostr Transport parameters (design spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NostrConfig {
    #[serde(default = "default_pow_difficulty")]
    pub pow_difficulty: u32,
    #[serde(default = "default_relays")]
    pub relays: Vec<String>,
}

/// Advanced / ambient settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log file path. Empty = stderr.
    #[serde(default)]
    pub log_file: String,
}

fn default_max_overall() -> u32 {
    20
}
fn default_max_client() -> u32 {
    8
}
fn default_max_server() -> u32 {
    12
}
fn default_fragment_mtu() -> usize {
    500
}
fn default_gossip_capacity() -> usize {
    raven_gossip::seen::DEFAULT_CAPACITY
}
fn default_gossip_byte_budget() -> usize {
    400
}
fn default_gossip_fpr() -> f64 {
    0.01
}
fn default_gossip_interval_ms() -> u64 {
    raven_gossip::sync::PERIODIC_SYNC_INTERVAL_MS
}
fn default_pow_difficulty() -> u32 {
    0
}
fn default_relays() -> Vec<String> {
    vec!["wss://relay.damus.io".to_string(), "wss://nos.lol".to_string()]
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: String::new() }
    }
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            max_overall: default_max_overall(),
            max_client: default_max_client(),
            max_server: default_max_server(),
            fragment_mtu: default_fragment_mtu(),
        }
    }
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            capacity: default_gossip_capacity(),
            byte_budget: default_gossip_byte_budget(),
            false_positive_rate: default_gossip_fpr(),
            interval_ms: default_gossip_interval_ms(),
        }
    }
}

impl Default for NostrConfig {
    fn default() -> Self {
        Self { pow_difficulty: default_pow_difficulty(), relays: default_relays() }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self { log_level: default_log_level(), log_file: String::new() }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location, falling
    /// back to defaults if it does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    fn config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("RAVEN_DATA_DIR") {
            return PathBuf::from(dir).join("config.toml");
        }
        Self::default_data_dir().join("config.toml")
    }

    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("RAVEN_DATA_DIR") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".raven"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/raven"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_ble_caps() {
        let config = DaemonConfig::default();
        assert_eq!(config.ble.max_overall, 20);
        assert!(config.ble.max_client <= config.ble.max_overall);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = DaemonConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let parsed: DaemonConfig = toml::from_str(&toml_str).expect("parse");
        assert_eq!(parsed.nostr.relays, config.nostr.relays);
    }

    #[test]
    fn gossip_defaults_match_the_gossip_crate() {
        let config = DaemonConfig::default();
        assert_eq!(config.gossip.capacity, raven_gossip::seen::DEFAULT_CAPACITY);
        assert_eq!(config.gossip.interval_ms, raven_gossip::sync::PERIODIC_SYNC_INTERVAL_MS);
    }
}
