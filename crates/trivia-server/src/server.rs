//! `TriviaServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → room. The server
//! owns the room manager, the connection hub that doubles as the rooms'
//! broadcaster, and a background task that evicts idle rooms.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use trivia_protocol::{Codec, JsonCodec};
use trivia_room::{MemoryTriviaStore, RoomConfig, RoomManager, TriviaStore};
use trivia_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{ConnectionHub, ServerConfig, ServerError};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<S: TriviaStore, C: Codec> {
    pub(crate) rooms: RoomManager<S, ConnectionHub>,
    pub(crate) hub: Arc<ConnectionHub>,
    pub(crate) codec: C,
    pub(crate) read_timeout: Duration,
}

/// Builder for configuring and starting a trivia server.
///
/// # Example
///
/// ```rust,no_run
/// use trivia_room::MemoryTriviaStore;
/// use trivia_server::TriviaServer;
///
/// # async fn run() -> Result<(), trivia_server::ServerError> {
/// let server = TriviaServer::builder()
///     .bind("0.0.0.0:3007")
///     .build(MemoryTriviaStore::new())
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TriviaServerBuilder {
    config: ServerConfig,
}

impl TriviaServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every setting at once, e.g. with [`ServerConfig::from_env`].
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind to. Port 0 picks a free port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn room_config(mut self, room: RoomConfig) -> Self {
        self.config.room = room;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Binds the listener and assembles the server around `store`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<S: TriviaStore>(
        self,
        store: S,
    ) -> Result<TriviaServer<S, JsonCodec>, ServerError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let hub = Arc::new(ConnectionHub::new());
        let state = Arc::new(ServerState {
            rooms: RoomManager::new(
                Arc::new(store),
                Arc::clone(&hub),
                self.config.room.clone(),
            ),
            hub,
            codec: JsonCodec,
            read_timeout: self.config.read_timeout,
        });

        Ok(TriviaServer {
            transport,
            state,
            idle_timeout: self.config.idle_timeout,
            sweep_interval: self.config.sweep_interval,
        })
    }
}

/// A bound trivia server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TriviaServer<S: TriviaStore, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, C>>,
    idle_timeout: Duration,
    sweep_interval: Duration,
}

impl TriviaServer<MemoryTriviaStore, JsonCodec> {
    /// Starts configuring a server. The store type is chosen by
    /// [`TriviaServerBuilder::build`].
    pub fn builder() -> TriviaServerBuilder {
        TriviaServerBuilder::new()
    }
}

impl<S, C> TriviaServer<S, C>
where
    S: TriviaStore,
    C: Codec + Clone,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Spawns one handler task per accepted connection and the idle room
    /// sweep. On shutdown the sweep stops and every room is destroyed.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ServerError> {
        match self.transport.local_addr() {
            Ok(addr) => tracing::info!(%addr, "trivia server running"),
            Err(_) => tracing::info!("trivia server running"),
        }

        let sweeper = tokio::spawn(sweep_idle_rooms(
            Arc::clone(&self.state),
            self.sweep_interval,
            self.idle_timeout,
        ));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => break,
            }
        }

        tracing::info!("trivia server shutting down");
        sweeper.abort();
        for room in self.state.rooms.room_ids().await {
            let _ = self.state.rooms.destroy_room(&room).await;
        }
        Ok(())
    }
}

/// Periodically evicts rooms that have been idle too long.
async fn sweep_idle_rooms<S: TriviaStore, C: Codec>(
    state: Arc<ServerState<S, C>>,
    every: Duration,
    max_idle: Duration,
) {
    let mut ticker = tokio::time::interval(every.max(MIN_SWEEP_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        for room in state.rooms.evict_idle(max_idle).await {
            state.hub.forget_room(&room);
        }
        let rooms = state.rooms.room_count().await;
        tracing::debug!(
            rooms,
            connections = state.hub.connection_count(),
            "idle sweep done"
        );
    }
}
