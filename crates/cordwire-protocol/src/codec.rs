//! Codec trait and the JSON implementation used on the gateway.
//!
//! A codec converts between Rust types and frames. The gateway speaks one
//! JSON text frame per message, so frames are encoded to `String` and
//! decoded from raw bytes (what the transport hands back).

use serde::{Serialize, de::DeserializeOwned};

use crate::{Envelope, ProtocolError};

/// A codec that can encode Rust types to text frames and decode them back.
///
/// `Send + Sync + 'static` so one codec can be shared by the read loop
/// and the heartbeat task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a frame back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Decodes one inbound frame into an [`Envelope`].
    fn decode_envelope(&self, data: &[u8]) -> Result<Envelope, ProtocolError> {
        self.decode(data)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use cordwire_protocol::{Codec, JsonCodec, Opcode};
///
/// let codec = JsonCodec;
/// let envelope = codec
///     .decode_envelope(br#"{"op":10,"d":{"heartbeat_interval":41250}}"#)
///     .unwrap();
/// assert_eq!(envelope.opcode(), Some(Opcode::Hello));
/// assert_eq!(envelope.sequence, None);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound;

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result = JsonCodec.decode_envelope(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_without_op_returns_error() {
        let result = JsonCodec.decode_envelope(br#"{"d": {}, "t": "READY"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_heartbeat_produces_text_frame() {
        let text = JsonCodec.encode(&outbound::heartbeat(Some(7))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, serde_json::json!({"op": 1, "d": 7}));
    }
}
