//! The core's single outbound event stream (design spec §9 Design Notes:
//! "Delegate/observer protocols ... map to a single enum of outbound events
//! published on a bounded channel; consumers subscribe by type").
//!
//! This replaces the mesh delegate / store-and-forward delegate / security
//! delegate protocols from the original design with one typed enum any UI
//! can fold into local state from an initial snapshot plus this delta
//! stream.

use serde::{Deserialize, Serialize};

use crate::session::SessionState;
use crate::PeerId;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CoreEvent {
    PeerAppeared { peer_id: PeerId, nickname: String, is_direct: bool },
    PeerUpdated { peer_id: PeerId, nickname: String },
    PeerRotated { old_id: PeerId, new_id: PeerId },
    PeerRemoved { peer_id: PeerId },

    HandshakeStateChanged { peer_id: PeerId, state: SessionState },

    MessageReceived { sender: PeerId, content: String, message_id: [u8; 16] },
    ChannelMessageReceived { channel: String, sender: PeerId, content: String },
    Delivered { message_id: [u8; 16] },
    ReadReceiptReceived { message_id: [u8; 16] },

    ChannelJoined { name: String },
    ChannelLeft { name: String },
    ShowPasswordPrompt { channel: String },

    FavoriteChanged { peer_id: PeerId, is_favorite: bool, is_mutual: bool },

    MessageSent { message_id: [u8; 16] },

    /// The core has entered degraded read-only mode after a fatal adapter
    /// failure (design spec §7).
    Degraded { reason: String },

    Error { detail: String },
}
