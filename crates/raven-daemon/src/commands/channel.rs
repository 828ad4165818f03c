//! Persisted channel records (`ch.<name>`, design spec §6), shared between
//! the control-intent handlers ([`super::intents`], which create/switch
//! channels) and the inbound message handler ([`super::mesh`], which needs
//! a channel's derived key to decrypt its traffic).

use serde::{Deserialize, Serialize};

use crate::DaemonState;

/// Record for a joined channel.
#[derive(Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub has_password: bool,
    pub is_creator: bool,
    /// PBKDF2-derived AES-GCM key, re-derived once from the password at
    /// join time (design spec §4.7 "Channel key derivation") and
    /// persisted so the password never needs to be re-entered just to
    /// decrypt inbound traffic. `None` for a channel with no password.
    pub channel_key: Option<[u8; 32]>,
}

pub fn key(name: &str) -> String {
    format!("ch.{name}")
}

/// Load a joined channel's record, if we're a member.
pub fn load(state: &DaemonState, name: &str) -> Option<ChannelRecord> {
    let bytes = state.kv.get(&key(name)).ok().flatten()?;
    serde_json::from_slice(&bytes).ok()
}

pub fn save(state: &DaemonState, name: &str, record: &ChannelRecord) -> raven_db::Result<()> {
    let bytes = serde_json::to_vec(record).expect("ChannelRecord always serializes");
    state.kv.set(&key(name), &bytes)
}
