//! Unified error type for the trivia server.

use trivia_protocol::ProtocolError;
use trivia_room::{RoomError, StoreError};
use trivia_transport::TransportError;

/// Top-level error wrapping every layer's error.
///
/// `#[from]` on each variant lets `?` convert layer errors directly.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding, accepting, sending or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room operation was rejected.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The trivia data could not be loaded at startup.
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use trivia_protocol::{RoomCode, TriviaId};

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::BindFailed(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "port taken",
        ));
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Transport(_)));
        assert!(server_err.to_string().contains("port taken"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::RoomFull(RoomCode::parse("AB12").unwrap());
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Room(_)));
        assert!(server_err.to_string().contains("AB12"));
    }

    #[test]
    fn test_from_store_error() {
        let err = StoreError::NotFound(TriviaId::new("t9"));
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Store(_)));
    }
}
