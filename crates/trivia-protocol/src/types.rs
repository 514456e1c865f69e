//! Message and identifier types that travel on the wire.
//!
//! Every enum here is *closed*: one variant per event name, each with a
//! fixed set of fields. JSON uses the adjacently tagged form
//!
//! ```json
//! { "event": "joinRoom", "data": { "roomId": "AB12", "name": "ana" } }
//! ```
//!
//! which maps one-to-one onto named socket events on the client side.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Shortest accepted room code.
pub const ROOM_CODE_MIN_LEN: usize = 4;
/// Longest accepted room code.
pub const ROOM_CODE_MAX_LEN: usize = 8;
/// Longest display name, counted in characters after trimming.
pub const NAME_MAX_LEN: usize = 32;
/// Longest answer text, counted in characters.
pub const ANSWER_MAX_LEN: usize = 256;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The short code that names a room, e.g. `"K3X9"`.
///
/// Codes are generated by the operator dashboard, not by the server. The
/// server only checks the shape: 4–8 ASCII letters or digits. The check
/// runs inside deserialization (`try_from = "String"`), so a request
/// carrying a bad code fails to decode at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Validates and wraps a room code.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidRoomCode`] when the code has the
    /// wrong length or contains anything but ASCII alphanumerics.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let len = raw.len();
        let well_formed = (ROOM_CODE_MIN_LEN..=ROOM_CODE_MAX_LEN)
            .contains(&len)
            && raw.bytes().all(|b| b.is_ascii_alphanumeric());
        if !well_formed {
            return Err(ProtocolError::InvalidRoomCode(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a player inside one room.
///
/// Generated by the room when the player first joins and deliberately
/// unrelated to any connection identifier: a reconnecting player keeps
/// the same id on a new connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wraps an already generated id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a question set held by the trivia store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriviaId(String);

impl TriviaId {
    /// Wraps a store identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriviaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// Lifecycle phase of a room.
///
/// ```text
/// Created ⇄ Open → InProgress → Ended
///    └───────┴──────────┴─────────↗  (operator end)
/// ```
///
/// - **Created**: room exists; players may join, the game may not start.
/// - **Open**: the operator activated the room; players may join and the
///   game may start.
/// - **InProgress**: rounds are running; joins are rejected.
/// - **Ended**: questions exhausted or the operator ended the game.
///   Terminal: nothing returns to `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomPhase {
    Created,
    Open,
    InProgress,
    Ended,
}

impl RoomPhase {
    /// Returns `true` if new players may join.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Created | Self::Open)
    }

    /// Returns `true` while rounds are running.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Returns `true` once the game has begun, including after it ended.
    pub fn has_started(&self) -> bool {
        matches!(self, Self::InProgress | Self::Ended)
    }

    /// Returns `true` if moving from `self` to `target` is a legal
    /// transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        match (self, target) {
            (Self::Created, Self::Open) | (Self::Open, Self::Created) => true,
            (Self::Open, Self::InProgress) => true,
            (from, Self::Ended) => from != Self::Ended,
            _ => false,
        }
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Open => write!(f, "Open"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// What clients see of a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub is_admin: bool,
    /// Whether the player already answered the current round.
    pub has_answered: bool,
}

/// The active question as shown to clients. Never carries the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub question: String,
    pub options: Vec<String>,
}

/// Full room state, sent on request and after every join.
///
/// `is_active`, `game_started` and `accepting_players` are derived from
/// `phase` and exist for clients that only look at flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: RoomCode,
    pub trivia_id: Option<TriviaId>,
    pub phase: RoomPhase,
    pub round: u32,
    pub total_rounds: u32,
    pub players: Vec<PlayerSummary>,
    pub current_question: Option<QuestionView>,
    pub is_active: bool,
    pub game_started: bool,
    pub accepting_players: bool,
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who receives a server event produced by a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Recipient {
    /// Every connection attached to the room, operators included.
    Room,
    /// Only the connection that owns this player.
    Player(PlayerId),
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Requests a client may send.
///
/// Room codes are checked while decoding; [`ClientRequest::validate`]
/// checks the remaining field rules. Both run at the connection boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientRequest {
    /// Operator: create the room (no-op if it exists) and watch it.
    CreateRoom {
        room_id: RoomCode,
        trivia_id: Option<TriviaId>,
    },

    /// Operator: open the room for starting, or close it again.
    UpdateRoomStatus { room_id: RoomCode, is_active: bool },

    /// Join as a player, or as the room's admin.
    JoinRoom {
        room_id: RoomCode,
        name: String,
        #[serde(default)]
        is_admin: bool,
    },

    /// Operator: start the game. `trivia_id` overrides the question set
    /// chosen at creation.
    StartGame {
        room_id: RoomCode,
        trivia_id: Option<TriviaId>,
    },

    /// Answer the current question. The player is the one this
    /// connection joined as.
    SubmitAnswer { room_id: RoomCode, answer: String },

    /// Operator: advance without waiting for the round deadline.
    NextRound { room_id: RoomCode },

    /// Operator: end the game now.
    EndGame { room_id: RoomCode },

    /// Ask for a [`RoomSnapshot`].
    GetRoomState { room_id: RoomCode },

    /// Leave the room without closing the connection.
    LeaveRoom { room_id: RoomCode },

    /// Keep an otherwise quiet connection open. Answered with `ack`.
    Heartbeat,
}

impl ClientRequest {
    /// The room this request targets. `None` for `heartbeat`.
    pub fn room_id(&self) -> Option<&RoomCode> {
        match self {
            Self::CreateRoom { room_id, .. }
            | Self::UpdateRoomStatus { room_id, .. }
            | Self::JoinRoom { room_id, .. }
            | Self::StartGame { room_id, .. }
            | Self::SubmitAnswer { room_id, .. }
            | Self::NextRound { room_id }
            | Self::EndGame { room_id }
            | Self::GetRoomState { room_id }
            | Self::LeaveRoom { room_id } => Some(room_id),
            Self::Heartbeat => None,
        }
    }

    /// Checks field rules that serde cannot express.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] for an empty or overlong
    /// name, or an overlong answer.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::JoinRoom { name, .. } => {
                let chars = name.trim().chars().count();
                if chars == 0 {
                    return Err(ProtocolError::InvalidMessage(
                        "name must not be empty".into(),
                    ));
                }
                if chars > NAME_MAX_LEN {
                    return Err(ProtocolError::InvalidMessage(format!(
                        "name longer than {NAME_MAX_LEN} characters"
                    )));
                }
                Ok(())
            }
            Self::SubmitAnswer { answer, .. } => {
                if answer.chars().count() > ANSWER_MAX_LEN {
                    return Err(ProtocolError::InvalidMessage(format!(
                        "answer longer than {ANSWER_MAX_LEN} characters"
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// A request plus the client's sequence number. Replies echo `seq` in
/// [`ServerEnvelope::reply_to`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    #[serde(default)]
    pub seq: u64,
    pub request: ClientRequest,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Machine-readable error codes carried by [`ServerEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    RoomNotFound,
    GameAlreadyStarted,
    RoomFull,
    RoomNotActive,
    TriviaLoadFailure,
    InvalidRequest,
    Unavailable,
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Full room state.
    RoomState(RoomSnapshot),

    /// Reply to `joinRoom`. `reconnected` is set when the name was
    /// already present and the existing player was returned.
    JoinAccepted {
        room_id: RoomCode,
        player_id: PlayerId,
        reconnected: bool,
    },

    PlayerJoined { player: PlayerSummary },

    PlayerLeft { player: PlayerSummary },

    /// The operator opened the room.
    RoomActivated { room_id: RoomCode },

    /// The operator closed the room again.
    RoomDeactivated { room_id: RoomCode },

    /// Pre-game countdown; the first round follows after `seconds`.
    Countdown { seconds: u32 },

    GameStarted { total_rounds: u32 },

    /// A round began. Answers are accepted for `timer_seconds`.
    NewRound {
        round: u32,
        total_rounds: u32,
        question: String,
        options: Vec<String>,
        timer_seconds: u32,
    },

    /// Sent only to the player who answered.
    AnswerSubmitted { correct: bool, score: u32 },

    RankingUpdated { ranking: Vec<PlayerSummary> },

    /// Questions are exhausted; the final ranking follows after
    /// `countdown` seconds.
    GameEnding { countdown: u32 },

    GameEnded { ranking: Vec<PlayerSummary> },

    /// Generic success reply.
    Ack,

    Error { code: ErrorCode, message: String },
}

/// An event plus sequencing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEnvelope {
    /// Per-connection outbound sequence number.
    pub seq: u64,
    /// `seq` of the request this event answers, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<u64>,
    /// Milliseconds since the connection was accepted.
    pub timestamp: u64,
    pub event: ServerEvent,
}
