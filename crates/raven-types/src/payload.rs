//! Noise payload TLV structures (design spec §3 "Noise Payload", §6 "TLV payloads").

use serde::{Deserialize, Serialize};

use crate::{MessageId, NoiseStaticPub, SigningPub};

/// Inner payload type carried inside a decrypted `NOISE_ENCRYPTED` packet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoisePayload {
    PrivateMessage(PrivateMessagePacket),
    Delivered { message_id: MessageId },
    ReadReceipt { message_id: MessageId },
    FileTransfer(BitchatFilePacket),
}

impl NoisePayload {
    pub const fn tlv_tag(&self) -> u8 {
        match self {
            NoisePayload::PrivateMessage(_) => 0x01,
            NoisePayload::Delivered { .. } => 0x02,
            NoisePayload::ReadReceipt { .. } => 0x03,
            NoisePayload::FileTransfer(_) => 0x04,
        }
    }
}

/// A private message payload (design spec §3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateMessagePacket {
    pub message_id: MessageId,
    pub content: String,
}

/// A file transfer payload (design spec §3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitchatFilePacket {
    pub file_name: String,
    pub mime_type: String,
    pub file_size: u64,
    pub content_bytes: Vec<u8>,
}

/// Identity announcement, carried in ANNOUNCE packets (design spec §3, §4.7).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAnnouncement {
    pub nickname: String,
    pub noise_static_pub: NoiseStaticPub,
    pub signing_pub: SigningPub,
}

/// A compact GCS filter, carried in REQUEST_SYNC packets (design spec §4.9).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSyncPacket {
    /// Number of items the filter was built over.
    pub n: u32,
    /// Golomb-Rice parameter (bits).
    pub p: u8,
    /// Golomb-Rice coded, bit-packed filter bytes.
    pub filter_bytes: Vec<u8>,
}
