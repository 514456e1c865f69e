//! Error types for the protocol layer.

/// Errors raised while encoding, decoding or validating wire messages.
///
/// Anything that fails here is the client's fault: the server answers
/// with an `invalidRequest` error event and the request never reaches a
/// room.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, unknown event name,
    /// missing fields, or a field that failed its own validation
    /// (see [`ProtocolError::InvalidRoomCode`]).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A room code that is not 4–8 ASCII alphanumerics.
    #[error("invalid room code {0:?}")]
    InvalidRoomCode(String),

    /// The message decoded but violates a field rule (empty name,
    /// oversized answer, ...).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
