//! Codec trait and the JSON implementation.
//!
//! The connection handler only sees bytes. A [`Codec`] turns those bytes
//! into [`ClientEnvelope`](crate::ClientEnvelope)s and turns
//! [`ServerEnvelope`](crate::ServerEnvelope)s back into bytes. Browser
//! clients speak JSON, so [`JsonCodec`] is the one the server uses.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value cannot be
    /// represented in this format.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or
    /// do not match `T`, including field-level validation performed
    /// during deserialization.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use trivia_protocol::{ClientEnvelope, ClientRequest, Codec, JsonCodec};
///
/// let raw = br#"{"seq":3,"request":{"event":"getRoomState","data":{"roomId":"ABCD"}}}"#;
/// let envelope: ClientEnvelope = JsonCodec.decode(raw).unwrap();
/// assert_eq!(envelope.seq, 3);
/// assert!(matches!(envelope.request, ClientRequest::GetRoomState { .. }));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ServerEnvelope, ServerEvent};

    #[test]
    fn test_encode_produces_utf8_json() {
        let envelope = ServerEnvelope {
            seq: 1,
            reply_to: None,
            timestamp: 10,
            event: ServerEvent::Ack,
        };
        let bytes = JsonCodec.encode(&envelope).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.contains(r#""event":"ack""#));
    }

    #[test]
    fn test_decode_rejects_truncated_input() {
        let result: Result<ServerEnvelope, _> =
            JsonCodec.decode(br#"{"seq":1,"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
