//! CBOR serialization helpers for the Raven TLV payload bodies.
//!
//! This module wraps [`ciborium`] to provide convenient serialization and
//! deserialization of the structs in [`raven_types::payload`] to/from CBOR
//! (RFC 8949) for inclusion in [`crate::payload`] TLV blobs.

use serde::{de::DeserializeOwned, Serialize};

use crate::CodecError;

/// Serialize a value to CBOR bytes.
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| CodecError::Serialization(format!("CBOR serialization failed: {e}")))?;
    Ok(buf)
}

/// Deserialize a value from CBOR bytes.
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, CodecError> {
    ciborium::from_reader(data)
        .map_err(|e| CodecError::Deserialization(format!("CBOR deserialization failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use raven_types::payload::PrivateMessagePacket;

    #[test]
    fn roundtrip() {
        let msg = PrivateMessagePacket {
            message_id: [1u8; 16],
            content: "hi".to_string(),
        };
        let bytes = to_vec(&msg).expect("serialize");
        let restored: PrivateMessagePacket = from_slice(&bytes).expect("deserialize");
        assert_eq!(msg, restored);
    }

    #[test]
    fn invalid_data_returns_error() {
        let bad_data = &[0xFF, 0xFF, 0xFF];
        let result: Result<PrivateMessagePacket, _> = from_slice(bad_data);
        assert!(result.is_err());
    }

    #[test]
    fn empty_data_returns_error() {
        let result: Result<PrivateMessagePacket, _> = from_slice(&[]);
        assert!(result.is_err());
    }

    #[test]
    fn cbor_is_compact_for_simple_values() {
        let message_id = [0u8; 16];
        let cbor = to_vec(&message_id).expect("serialize");
        let json = serde_json::to_vec(&message_id).expect("serialize json");
        assert!(cbor.len() <= json.len());
    }
}
