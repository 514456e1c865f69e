//! Error types for the room layer.

use trivia_protocol::{ErrorCode, RoomCode, TriviaId};

/// Errors reported synchronously to whoever asked for a room operation.
///
/// Answer submissions have no error type: the cases where an answer is
/// ignored (unknown player, admin, second answer) are client retries or
/// races, so `submit_answer` simply returns `None`.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The game has started (or already ended); the room no longer
    /// accepts joins or another start.
    #[error("game in room {0} already started")]
    GameAlreadyStarted(RoomCode),

    /// No slot left for another non-admin player.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The operator has not opened the room yet.
    #[error("room {0} is not active")]
    RoomNotActive(RoomCode),

    /// The question set could not be fetched or is malformed. Nothing
    /// was committed to the room.
    #[error("could not load trivia: {0}")]
    TriviaLoadFailure(#[from] StoreError),

    /// The room's actor is gone (command channel closed).
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// The wire code clients use to pick a message.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::RoomNotFound,
            Self::GameAlreadyStarted(_) => ErrorCode::GameAlreadyStarted,
            Self::RoomFull(_) => ErrorCode::RoomFull,
            Self::RoomNotActive(_) => ErrorCode::RoomNotActive,
            Self::TriviaLoadFailure(_) => ErrorCode::TriviaLoadFailure,
            Self::Unavailable(_) => ErrorCode::Unavailable,
        }
    }
}

/// Errors from a [`TriviaStore`](crate::TriviaStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No question set with this id.
    #[error("trivia {0} not found")]
    NotFound(TriviaId),

    /// The room has no question set assigned and the request named none.
    #[error("no trivia assigned to the room")]
    Unassigned,

    /// The question set violates a shape rule.
    #[error("malformed question set: {0}")]
    Malformed(String),

    /// Reading a trivia file failed.
    #[error("reading trivia file failed: {0}")]
    Io(#[from] std::io::Error),

    /// A trivia document is not valid JSON for the expected shape.
    #[error("parsing trivia document failed: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> RoomCode {
        RoomCode::parse("AB12").unwrap()
    }

    #[test]
    fn test_codes_distinguish_join_rejections() {
        assert_eq!(RoomError::NotFound(code()).code(), ErrorCode::RoomNotFound);
        assert_eq!(RoomError::RoomFull(code()).code(), ErrorCode::RoomFull);
        assert_eq!(
            RoomError::GameAlreadyStarted(code()).code(),
            ErrorCode::GameAlreadyStarted
        );
    }

    #[test]
    fn test_store_error_converts_to_trivia_load_failure() {
        let err: RoomError = StoreError::NotFound(TriviaId::new("t1")).into();
        assert_eq!(err.code(), ErrorCode::TriviaLoadFailure);
        assert!(err.to_string().contains("t1"));
    }
}
