//! Wire protocol for the trivia room server.
//!
//! This crate defines what travels between the server and its clients:
//!
//! - **Identifiers** ([`RoomCode`], [`PlayerId`], [`TriviaId`]): opaque
//!   string newtypes. Room codes are validated while decoding, so a
//!   malformed code never reaches the room layer.
//! - **Requests** ([`ClientRequest`]): the closed set of things a client
//!   may ask for, wrapped in a [`ClientEnvelope`].
//! - **Events** ([`ServerEvent`]): the closed set of things the server
//!   pushes, wrapped in a [`ServerEnvelope`].
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes ⇄ messages.
//!
//! ```text
//! Transport (bytes) → Protocol (envelopes) → Room layer (state machine)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ANSWER_MAX_LEN, ClientEnvelope, ClientRequest, ErrorCode, NAME_MAX_LEN,
    PlayerId, PlayerSummary, QuestionView, ROOM_CODE_MAX_LEN,
    ROOM_CODE_MIN_LEN, Recipient, RoomCode, RoomPhase, RoomSnapshot,
    ServerEnvelope, ServerEvent, TriviaId,
};
