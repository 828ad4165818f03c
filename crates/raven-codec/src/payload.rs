//! TLV encoding for the body of a decrypted `NOISE_ENCRYPTED` packet, and
//! for the `ANNOUNCE`/`REQUEST_SYNC` packet bodies.
//!
//! Layout: a sequence of `{tag: u8, len: u16 BE, value: [u8; len]}` triples.
//! A reader skips any tag it doesn't recognize instead of rejecting the
//! whole blob, and a relay that doesn't understand a tag still has enough
//! structure (its length) to forward the entry untouched.

use raven_types::payload::{
    BitchatFilePacket, IdentityAnnouncement, NoisePayload, PrivateMessagePacket, RequestSyncPacket,
};

use crate::{cbor, CodecError, Result};

const TAG_PRIVATE_MESSAGE: u8 = 0x01;
const TAG_DELIVERED: u8 = 0x02;
const TAG_READ_RECEIPT: u8 = 0x03;
const TAG_FILE_TRANSFER: u8 = 0x04;

const TAG_BODY_CONTENT: u8 = 0x01;
const TAG_BODY_CHANNEL: u8 = 0x02;

/// One `{tag, len, value}` triple in a TLV sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvEntry {
    pub tag: u8,
    pub value: Vec<u8>,
}

/// Encode a sequence of TLV entries back to back.
pub fn encode_tlv_sequence(entries: &[TlvEntry]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for entry in entries {
        if entry.value.len() > u16::MAX as usize {
            return Err(CodecError::PayloadTooLarge(entry.value.len()));
        }
        out.push(entry.tag);
        out.extend_from_slice(&(entry.value.len() as u16).to_be_bytes());
        out.extend_from_slice(&entry.value);
    }
    Ok(out)
}

/// Decode a TLV sequence. Every entry is returned, known tag or not —
/// callers decide what to do with tags they don't recognize (ignore them,
/// or forward them verbatim).
pub fn decode_tlv_sequence(data: &[u8]) -> Result<Vec<TlvEntry>> {
    let mut entries = Vec::new();
    let mut cursor = 0usize;
    while cursor < data.len() {
        if data.len() - cursor < 3 {
            return Err(CodecError::Truncated);
        }
        let tag = data[cursor];
        let len = u16::from_be_bytes([data[cursor + 1], data[cursor + 2]]) as usize;
        cursor += 3;
        if data.len() - cursor < len {
            return Err(CodecError::Truncated);
        }
        entries.push(TlvEntry { tag, value: data[cursor..cursor + len].to_vec() });
        cursor += len;
    }
    Ok(entries)
}

/// Encode a [`NoisePayload`] as a single-entry TLV sequence.
pub fn encode_noise_payload(payload: &NoisePayload) -> Result<Vec<u8>> {
    let tag = payload.tlv_tag();
    let value = match payload {
        NoisePayload::PrivateMessage(msg) => cbor::to_vec(msg)?,
        NoisePayload::Delivered { message_id } => cbor::to_vec(message_id)?,
        NoisePayload::ReadReceipt { message_id } => cbor::to_vec(message_id)?,
        NoisePayload::FileTransfer(file) => cbor::to_vec(file)?,
    };
    encode_tlv_sequence(&[TlvEntry { tag, value }])
}

/// Decode a TLV sequence produced by [`encode_noise_payload`]. Entries
/// whose tag isn't one of ours are skipped rather than treated as an
/// error, so a future sender can add new optional tags without breaking
/// older readers.
pub fn decode_noise_payload(data: &[u8]) -> Result<NoisePayload> {
    let entries = decode_tlv_sequence(data)?;
    for entry in &entries {
        let payload = match entry.tag {
            TAG_PRIVATE_MESSAGE => NoisePayload::PrivateMessage(cbor::from_slice::<PrivateMessagePacket>(&entry.value)?),
            TAG_DELIVERED => NoisePayload::Delivered { message_id: cbor::from_slice(&entry.value)? },
            TAG_READ_RECEIPT => NoisePayload::ReadReceipt { message_id: cbor::from_slice(&entry.value)? },
            TAG_FILE_TRANSFER => NoisePayload::FileTransfer(cbor::from_slice::<BitchatFilePacket>(&entry.value)?),
            _ => continue,
        };
        return Ok(payload);
    }
    Err(CodecError::Truncated)
}

/// Encode an identity announcement, carried as the payload of an `ANNOUNCE` packet.
pub fn encode_announcement(announcement: &IdentityAnnouncement) -> Result<Vec<u8>> {
    cbor::to_vec(announcement)
}

/// Decode an identity announcement.
pub fn decode_announcement(data: &[u8]) -> Result<IdentityAnnouncement> {
    cbor::from_slice(data)
}

/// Encode a GCS sync filter, carried as the payload of a `REQUEST_SYNC` packet.
pub fn encode_request_sync(sync: &RequestSyncPacket) -> Result<Vec<u8>> {
    cbor::to_vec(sync)
}

/// Decode a GCS sync filter.
pub fn decode_request_sync(data: &[u8]) -> Result<RequestSyncPacket> {
    cbor::from_slice(data)
}

/// Body of a broadcast `MESSAGE` packet. `channel` is absent for public
/// (unnamed) chat and present for a named channel, whose content may or may
/// not be further encrypted under a password-derived key depending on
/// whether the channel has one — that layer is handled by the caller, this
/// only carries the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody {
    pub content_bytes: Vec<u8>,
    pub channel: Option<String>,
}

/// Encode a [`MessageBody`] as a TLV sequence.
pub fn encode_message_body(body: &MessageBody) -> Result<Vec<u8>> {
    let mut entries = vec![TlvEntry { tag: TAG_BODY_CONTENT, value: body.content_bytes.clone() }];
    if let Some(channel) = &body.channel {
        entries.push(TlvEntry { tag: TAG_BODY_CHANNEL, value: channel.as_bytes().to_vec() });
    }
    encode_tlv_sequence(&entries)
}

/// Decode a [`MessageBody`]. A missing content tag is an error; a missing
/// channel tag just means public chat.
pub fn decode_message_body(data: &[u8]) -> Result<MessageBody> {
    let entries = decode_tlv_sequence(data)?;
    let mut content_bytes = None;
    let mut channel = None;
    for entry in entries {
        match entry.tag {
            TAG_BODY_CONTENT => content_bytes = Some(entry.value),
            TAG_BODY_CHANNEL => {
                channel = Some(String::from_utf8(entry.value).map_err(|_| CodecError::Truncated)?)
            }
            _ => continue,
        }
    }
    Ok(MessageBody { content_bytes: content_bytes.ok_or(CodecError::Truncated)?, channel })
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_types::payload::PrivateMessagePacket;

    #[test]
    fn private_message_roundtrip() {
        let payload = NoisePayload::PrivateMessage(PrivateMessagePacket {
            message_id: [9u8; 16],
            content: "hey there".to_string(),
        });
        let bytes = encode_noise_payload(&payload).expect("encode");
        let decoded = decode_noise_payload(&bytes).expect("decode");
        assert_eq!(payload, decoded);
    }

    #[test]
    fn delivered_roundtrip() {
        let payload = NoisePayload::Delivered { message_id: [3u8; 16] };
        let bytes = encode_noise_payload(&payload).expect("encode");
        let decoded = decode_noise_payload(&bytes).expect("decode");
        assert_eq!(payload, decoded);
    }

    #[test]
    fn announcement_roundtrip() {
        let announcement = IdentityAnnouncement {
            nickname: "alice".to_string(),
            noise_static_pub: [1u8; 32],
            signing_pub: [2u8; 32],
        };
        let bytes = encode_announcement(&announcement).expect("encode");
        let decoded = decode_announcement(&bytes).expect("decode");
        assert_eq!(announcement, decoded);
    }

    #[test]
    fn unknown_leading_tag_is_skipped_not_rejected() {
        let known = encode_noise_payload(&NoisePayload::Delivered { message_id: [7u8; 16] }).unwrap();
        let mut bytes = encode_tlv_sequence(&[TlvEntry { tag: 0xEE, value: vec![1, 2, 3] }]).unwrap();
        bytes.extend_from_slice(&known);
        let decoded = decode_noise_payload(&bytes).expect("unknown leading tag must not reject the whole sequence");
        assert_eq!(decoded, NoisePayload::Delivered { message_id: [7u8; 16] });
    }

    #[test]
    fn sequence_of_only_unknown_tags_has_no_recognizable_payload() {
        let bytes = encode_tlv_sequence(&[TlvEntry { tag: 0xEE, value: vec![0, 0, 0] }]).unwrap();
        assert!(decode_noise_payload(&bytes).is_err());
    }

    #[test]
    fn tlv_sequence_roundtrips_multiple_entries() {
        let entries = vec![
            TlvEntry { tag: 0x01, value: vec![1, 2, 3] },
            TlvEntry { tag: 0xEE, value: vec![] },
            TlvEntry { tag: 0x04, value: vec![9; 20] },
        ];
        let bytes = encode_tlv_sequence(&entries).unwrap();
        let decoded = decode_tlv_sequence(&bytes).unwrap();
        assert_eq!(entries, decoded);
    }

    #[test]
    fn truncated_length_prefix_is_rejected() {
        assert!(decode_tlv_sequence(&[0x01, 0x00]).is_err());
    }

    #[test]
    fn truncated_value_is_rejected() {
        assert!(decode_tlv_sequence(&[0x01, 0x00, 0x05, 1, 2]).is_err());
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(decode_noise_payload(&[]).is_err());
    }

    #[test]
    fn message_body_public_chat_roundtrip() {
        let body = MessageBody { content_bytes: b"hello world".to_vec(), channel: None };
        let bytes = encode_message_body(&body).unwrap();
        assert_eq!(decode_message_body(&bytes).unwrap(), body);
    }

    #[test]
    fn message_body_channel_roundtrip() {
        let body = MessageBody { content_bytes: vec![1, 2, 3, 4], channel: Some("#general".to_string()) };
        let bytes = encode_message_body(&body).unwrap();
        assert_eq!(decode_message_body(&bytes).unwrap(), body);
    }

    #[test]
    fn message_body_missing_content_tag_is_rejected() {
        let bytes = encode_tlv_sequence(&[TlvEntry { tag: TAG_BODY_CHANNEL, value: b"x".to_vec() }]).unwrap();
        assert!(decode_message_body(&bytes).is_err());
    }
}
