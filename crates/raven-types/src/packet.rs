//! The canonical mesh packet record (design spec §3 "Packet", §6 wire format).
//!
//! This module holds the in-memory representation only; byte-level framing
//! and the signing canonicalization live in `raven-codec`, which depends on
//! this crate.

use serde::{Deserialize, Serialize};

use crate::PeerId;

/// Packet type tag (design spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    Announce,
    Leave,
    Message,
    NoiseHandshake,
    NoiseEncrypted,
    Fragment,
    DeliveryAck,
    ReadReceipt,
    RequestSync,
    FileTransfer,
}

impl PacketType {
    /// Wire tag per the type registry in §6. Stable — never renumber.
    pub const fn wire_tag(self) -> u8 {
        match self {
            PacketType::Announce => 0x01,
            PacketType::Leave => 0x02,
            PacketType::Message => 0x03,
            PacketType::NoiseHandshake => 0x04,
            PacketType::NoiseEncrypted => 0x05,
            PacketType::Fragment => 0x06,
            PacketType::DeliveryAck => 0x07,
            PacketType::ReadReceipt => 0x08,
            PacketType::RequestSync => 0x09,
            PacketType::FileTransfer => 0x0A,
        }
    }

    pub const fn from_wire_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0x01 => PacketType::Announce,
            0x02 => PacketType::Leave,
            0x03 => PacketType::Message,
            0x04 => PacketType::NoiseHandshake,
            0x05 => PacketType::NoiseEncrypted,
            0x06 => PacketType::Fragment,
            0x07 => PacketType::DeliveryAck,
            0x08 => PacketType::ReadReceipt,
            0x09 => PacketType::RequestSync,
            0x0A => PacketType::FileTransfer,
            _ => return None,
        })
    }
}

/// Protocol version: 1 for control packets (u16 payload length), 2 for
/// large payloads such as file transfers (u32 payload length).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVersion {
    V1 = 1,
    V2 = 2,
}

impl ProtocolVersion {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(ProtocolVersion::V1),
            2 => Some(ProtocolVersion::V2),
            _ => None,
        }
    }
}

/// A decoded mesh packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub version: ProtocolVersion,
    pub packet_type: PacketType,
    pub ttl: u8,
    /// Unix epoch milliseconds.
    pub timestamp: u64,
    pub sender_id: PeerId,
    /// `None` means broadcast.
    pub recipient_id: Option<PeerId>,
    pub payload: Vec<u8>,
    /// Ed25519 signature over the canonical signing bytes, if present.
    pub signature: Option<[u8; 64]>,
}

impl Packet {
    pub fn is_broadcast(&self) -> bool {
        self.recipient_id.is_none()
    }

    pub fn addressed_to(&self, peer_id: &PeerId) -> bool {
        matches!(&self.recipient_id, Some(id) if id == peer_id)
    }
}
