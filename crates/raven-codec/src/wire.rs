//! Binary packet framing for the Raven mesh protocol.
//!
//! ## Wire format
//!
//! ```text
//! version:      u8
//! packet_type:  u8
//! ttl:          u8
//! timestamp:    u64 BE   (ms since epoch)
//! sender_id:    [u8; 8]
//! flags:        u8       (bit0 = has recipient, bit1 = has signature)
//! recipient_id: [u8; 8]  (present iff flags bit0)
//! payload_len:  u16 BE (version 1) | u32 BE (version 2)
//! payload:      [u8; payload_len]
//! signature:    [u8; 64] (present iff flags bit1)
//! ```
//!
//! [`to_bytes_for_signing`] produces the same layout with the signature
//! flag always cleared and no signature bytes appended — this is the
//! single canonical preimage used for both signing and verification,
//! regardless of whether the final packet ends up signed.

use raven_types::packet::{Packet, PacketType, ProtocolVersion};
use raven_types::PeerId;

use crate::{CodecError, Result};

const FLAG_HAS_RECIPIENT: u8 = 0b0000_0001;
const FLAG_HAS_SIGNATURE: u8 = 0b0000_0010;

/// Per-type payload ceilings, independent of the version's length-prefix width.
fn max_payload_len(packet_type: PacketType) -> usize {
    match packet_type {
        PacketType::FileTransfer | PacketType::Fragment => 16 * 1024 * 1024,
        _ => 65_535,
    }
}

/// Encode a packet to its wire bytes, including the signature if present.
pub fn to_bytes(packet: &Packet) -> Result<Vec<u8>> {
    encode(packet, true)
}

/// Encode the canonical signing preimage: every field except the signature.
pub fn to_bytes_for_signing(packet: &Packet) -> Result<Vec<u8>> {
    encode(packet, false)
}

fn encode(packet: &Packet, include_signature: bool) -> Result<Vec<u8>> {
    let max_len = max_payload_len(packet.packet_type);
    if packet.payload.len() > max_len {
        return Err(CodecError::PayloadTooLarge(packet.payload.len()));
    }

    let mut flags = 0u8;
    if packet.recipient_id.is_some() {
        flags |= FLAG_HAS_RECIPIENT;
    }
    let will_sign = include_signature && packet.signature.is_some();
    if will_sign {
        flags |= FLAG_HAS_SIGNATURE;
    }

    let mut out = Vec::with_capacity(32 + packet.payload.len());
    out.push(packet.version as u8);
    out.push(packet.packet_type.wire_tag());
    out.push(packet.ttl);
    out.extend_from_slice(&packet.timestamp.to_be_bytes());
    out.extend_from_slice(&packet.sender_id);
    out.push(flags);
    if let Some(recipient) = &packet.recipient_id {
        out.extend_from_slice(recipient);
    }

    match packet.version {
        ProtocolVersion::V1 => {
            let len: u16 = packet
                .payload
                .len()
                .try_into()
                .map_err(|_| CodecError::PayloadTooLarge(packet.payload.len()))?;
            out.extend_from_slice(&len.to_be_bytes());
        }
        ProtocolVersion::V2 => {
            let len = packet.payload.len() as u32;
            out.extend_from_slice(&len.to_be_bytes());
        }
    }
    out.extend_from_slice(&packet.payload);

    if will_sign {
        out.extend_from_slice(&packet.signature.expect("checked above")[..]);
    }

    Ok(out)
}

/// Decode a packet from wire bytes, validating its header along the way.
pub fn from_bytes(data: &[u8]) -> Result<Packet> {
    let mut cursor = Cursor::new(data);

    let version_byte = cursor.read_u8()?;
    let version =
        ProtocolVersion::from_u8(version_byte).ok_or(CodecError::UnsupportedVersion(version_byte))?;

    let type_byte = cursor.read_u8()?;
    let packet_type = PacketType::from_wire_tag(type_byte).ok_or(CodecError::UnknownType(type_byte))?;

    let ttl = cursor.read_u8()?;
    let timestamp = cursor.read_u64()?;
    let sender_id: PeerId = cursor.read_array::<8>()?;
    let flags = cursor.read_u8()?;

    let recipient_id = if flags & FLAG_HAS_RECIPIENT != 0 {
        Some(cursor.read_array::<8>()?)
    } else {
        None
    };

    let payload_len: usize = match version {
        ProtocolVersion::V1 => cursor.read_u16()? as usize,
        ProtocolVersion::V2 => cursor.read_u32()? as usize,
    };

    let max_len = max_payload_len(packet_type);
    if payload_len > max_len {
        return Err(CodecError::PayloadTooLarge(payload_len));
    }
    let payload = cursor.read_bytes(payload_len)?.to_vec();

    let signature = if flags & FLAG_HAS_SIGNATURE != 0 {
        Some(cursor.read_array::<64>()?)
    } else {
        None
    };

    Ok(Packet {
        version,
        packet_type,
        ttl,
        timestamp,
        sender_id,
        recipient_id,
        payload,
        signature,
    })
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(CodecError::Truncated);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes(bytes.try_into().expect("length 2")))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes(bytes.try_into().expect("length 4")))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_be_bytes(bytes.try_into().expect("length 8")))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet() -> Packet {
        Packet {
            version: ProtocolVersion::V1,
            packet_type: PacketType::Message,
            ttl: 7,
            timestamp: 1_700_000_000_000,
            sender_id: [1, 2, 3, 4, 5, 6, 7, 8],
            recipient_id: Some([8, 7, 6, 5, 4, 3, 2, 1]),
            payload: b"hello mesh".to_vec(),
            signature: None,
        }
    }

    #[test]
    fn roundtrip_unsigned_packet() {
        let packet = sample_packet();
        let bytes = to_bytes(&packet).expect("encode");
        let decoded = from_bytes(&bytes).expect("decode");
        assert_eq!(packet, decoded);
    }

    #[test]
    fn roundtrip_broadcast_packet() {
        let mut packet = sample_packet();
        packet.recipient_id = None;
        let bytes = to_bytes(&packet).expect("encode");
        let decoded = from_bytes(&bytes).expect("decode");
        assert_eq!(packet, decoded);
        assert!(decoded.is_broadcast());
    }

    #[test]
    fn roundtrip_signed_packet() {
        let mut packet = sample_packet();
        packet.signature = Some([0x42; 64]);
        let bytes = to_bytes(&packet).expect("encode");
        let decoded = from_bytes(&bytes).expect("decode");
        assert_eq!(packet, decoded);
    }

    #[test]
    fn signing_bytes_exclude_signature_and_are_stable() {
        let mut signed = sample_packet();
        signed.signature = Some([0x42; 64]);
        let mut unsigned = signed.clone();
        unsigned.signature = None;

        assert_eq!(
            to_bytes_for_signing(&signed).expect("sign bytes"),
            to_bytes_for_signing(&unsigned).expect("sign bytes")
        );
    }

    #[test]
    fn truncated_input_is_rejected() {
        let packet = sample_packet();
        let bytes = to_bytes(&packet).expect("encode");
        let result = from_bytes(&bytes[..bytes.len() - 3]);
        assert!(matches!(result, Err(CodecError::Truncated)));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut bytes = to_bytes(&sample_packet()).expect("encode");
        bytes[0] = 99;
        assert!(matches!(
            from_bytes(&bytes),
            Err(CodecError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut bytes = to_bytes(&sample_packet()).expect("encode");
        bytes[1] = 0xEE;
        assert!(matches!(from_bytes(&bytes), Err(CodecError::UnknownType(0xEE))));
    }

    #[test]
    fn declared_payload_larger_than_type_maximum_is_rejected() {
        let mut packet = sample_packet();
        packet.packet_type = PacketType::Announce;
        let bytes = to_bytes(&packet).expect("encode");

        // Forge a declared length beyond this type's 65,535-byte ceiling.
        let mut forged = bytes.clone();
        let len_offset = forged.len() - packet.payload.len() - 2;
        forged[len_offset..len_offset + 2].copy_from_slice(&u16::MAX.to_be_bytes());
        assert!(matches!(
            from_bytes(&forged),
            Err(CodecError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn v2_packet_uses_32_bit_length_prefix() {
        let mut packet = sample_packet();
        packet.version = ProtocolVersion::V2;
        packet.packet_type = PacketType::FileTransfer;
        packet.payload = vec![7u8; 70_000];
        let bytes = to_bytes(&packet).expect("encode");
        let decoded = from_bytes(&bytes).expect("decode");
        assert_eq!(decoded.payload.len(), 70_000);
    }
}
