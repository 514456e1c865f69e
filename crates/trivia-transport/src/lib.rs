//! Transport layer for the trivia room server.
//!
//! [`Transport`] accepts connections, [`Connection`] moves frames. The
//! room layer never sees either: the server's connection handler decodes
//! frames into requests and encodes events back into frames.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Process-unique identifier of one accepted connection.
///
/// Distinct from `PlayerId`: a player who reconnects gets a new
/// `ConnectionId` but keeps their player id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a `ConnectionId` from a raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// The address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<std::net::SocketAddr>;
}

/// A bidirectional frame stream.
///
/// `send` and `recv` take `&self` and must not block each other: the
/// server reads requests in one task while a writer task pushes room
/// events through the same connection.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame. UTF-8 payloads go out as text frames.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next data frame.
    ///
    /// Returns `Ok(None)` once the peer closed the connection.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Time since the peer last sent any frame, control frames included.
    /// Counts from the upgrade until the first frame arrives.
    fn idle_for(&self) -> std::time::Duration;

    /// Returns the identifier of this connection.
    fn id(&self) -> ConnectionId;
}
