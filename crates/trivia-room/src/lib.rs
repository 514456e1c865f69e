//! Room session manager for the trivia server.
//!
//! Each room runs as an isolated Tokio task (actor) that owns the room's
//! state machine and its round timer. Every mutation of a room goes
//! through the actor's command channel, so joins, answers and timer-driven
//! advancement for one room never interleave, while separate rooms run
//! fully in parallel.
//!
//! # Key types
//!
//! - [`RoomSession`]: the synchronous state machine for one room
//! - [`RoomManager`]: the registry: creates, routes to and evicts rooms
//! - [`RoomHandle`]: sends commands to a running room actor
//! - [`TriviaStore`]: where question sets come from
//! - [`Broadcaster`]: where room events go
//! - [`RoomConfig`]: capacity and timing

mod broadcast;
mod config;
mod error;
mod manager;
mod room;
mod session;
mod store;

pub use broadcast::Broadcaster;
pub use config::RoomConfig;
pub use error::{RoomError, StoreError};
pub use manager::RoomManager;
pub use room::{RoomHandle, RoomInfo};
pub use session::{
    AnswerOutcome, BASE_POINTS, JoinOutcome, Player, Question, RoomSession,
    SPEED_BONUS, speed_bonus,
};
pub use store::{
    MAX_OPTIONS, MAX_QUESTIONS, MIN_OPTIONS, MemoryTriviaStore, Trivia,
    TriviaStore, validate_questions,
};
pub use trivia_protocol::RoomPhase;
