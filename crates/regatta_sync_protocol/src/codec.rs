//! CBOR encoding and decoding for protocol messages.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Result type for codec operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or decoding protocol messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A value could not be encoded to CBOR.
    #[error("encode error: {0}")]
    Encode(String),

    /// Bytes could not be decoded into the expected message.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Encodes a message to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> ProtocolResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::ser::into_writer(value, &mut buffer)
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;
    Ok(buffer)
}

/// Decodes a message from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> ProtocolResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regatta_types::{DeviceId, SyncId};
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Probe {
        id: SyncId,
        device: DeviceId,
        count: u32,
    }

    #[test]
    fn roundtrip() {
        let probe = Probe {
            id: SyncId::from_bytes([1u8; 16]),
            device: DeviceId::from_bytes([2u8; 16]),
            count: 7,
        };
        let bytes = to_cbor(&probe).unwrap();
        let decoded: Probe = from_cbor(&bytes).unwrap();
        assert_eq!(decoded, probe);
    }

    #[test]
    fn decode_garbage_fails() {
        let result: ProtocolResult<Probe> = from_cbor(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
