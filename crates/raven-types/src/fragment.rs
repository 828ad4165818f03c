//! Fragment wire record (design spec §3 "Fragment", §4.2).

use serde::{Deserialize, Serialize};

use crate::TransferId;

/// A single fragment of an oversized packet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub transfer_id: TransferId,
    pub index: u16,
    pub total: u16,
    pub bytes: Vec<u8>,
}
