//! # Trivia server
//!
//! Multiplayer trivia rooms over WebSocket. An operator creates and opens
//! a room, players join by name, and the server runs timed rounds,
//! scores answers and publishes rankings.
//!
//! The crate wires the layers together:
//!
//! - [`trivia_transport`] accepts WebSocket connections
//! - [`trivia_protocol`] defines the JSON envelopes on the wire
//! - [`trivia_room`] runs one actor per room
//! - [`ConnectionHub`] routes room events back to connections
//!
//! ```rust,no_run
//! use trivia_server::{ServerConfig, TriviaServer};
//!
//! # async fn run() -> Result<(), trivia_server::ServerError> {
//! let config = ServerConfig::from_env();
//! let store = config.load_store()?;
//! let server = TriviaServer::builder().config(config).build(store).await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod hub;
mod server;

pub use config::{DEFAULT_BIND, ServerConfig};
pub use error::ServerError;
pub use hub::ConnectionHub;
pub use server::{TriviaServer, TriviaServerBuilder};

pub mod prelude {
    //! Everything needed to run a server and talk to it.

    pub use crate::{ServerConfig, ServerError, TriviaServer, TriviaServerBuilder};
    pub use trivia_protocol::{
        ClientEnvelope, ClientRequest, Codec, ErrorCode, JsonCodec, PlayerId,
        PlayerSummary, RoomCode, RoomPhase, RoomSnapshot, ServerEnvelope,
        ServerEvent, TriviaId,
    };
    pub use trivia_room::{
        MemoryTriviaStore, Question, RoomConfig, RoomError, StoreError, Trivia,
        TriviaStore,
    };
}
