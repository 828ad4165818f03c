//! Control intents from the external UI (design spec §6 "Control intents").
//!
//! The UI is an external collaborator; it drives the core exclusively
//! through these intents and observes it exclusively through
//! [`crate::events::CoreEvent`].

use serde::{Deserialize, Serialize};

use crate::PeerId;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ControlIntent {
    JoinChannel { name: String, password: Option<String> },
    LeaveChannel { name: String },
    SwitchChannel { name: Option<String> },
    SendPublic { content: String, mentions: Vec<String>, channel: Option<String> },
    SendPrivate { content: String, peer_id: PeerId, message_id: Option<[u8; 16]> },
    StartPrivate { peer_id: PeerId },
    ToggleFavorite { peer_id: PeerId },
    SetNickname { nickname: String },
    TeleportToGeohash { geohash: String },
    Block { peer_id: PeerId },
    Unblock { peer_id: PeerId },
    PanicClearAll,
}

/// Result of executing a [`ControlIntent`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntentResult {
    pub ok: bool,
    pub error: Option<String>,
}

impl IntentResult {
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { ok: false, error: Some(message.into()) }
    }
}
