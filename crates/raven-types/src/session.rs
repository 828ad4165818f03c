//! Noise session state (design spec §3 "Session State").

use serde::{Deserialize, Serialize};

/// Per-peer Noise XX handshake state, held by the Security Core and
/// exposed read-only to the rest of the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Uninitialized,
    Handshaking,
    Established,
    Failed,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Uninitialized
    }
}
