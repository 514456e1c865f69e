//! Per-connection handler: decode requests, call the room manager, reply.
//!
//! Each accepted connection gets its own Tokio task running this handler
//! plus a writer task:
//!   1. The handler registers the connection with the hub.
//!   2. The writer drains the connection's outbound channel, stamping
//!      every event with a sequence number.
//!   3. The handler loops: receive an envelope, validate, dispatch, reply.
//!   4. On exit the guard unregisters the connection and removes the
//!      players it owned.

use std::sync::Arc;
use std::time::Instant;

use trivia_protocol::{
    ClientEnvelope, ClientRequest, Codec, ErrorCode, ServerEnvelope,
    ServerEvent,
};
use trivia_room::{RoomError, TriviaStore};
use trivia_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::ServerError;
use crate::hub::{Outbound, OutboundReceiver};
use crate::server::ServerState;

/// Drop guard that detaches a connection when its handler exits.
///
/// Runs even if the handler panics. Removing players is async, so it is
/// spawned as a fire-and-forget task.
struct ConnectionGuard<S: TriviaStore, C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<S, C>>,
}

impl<S: TriviaStore, C: Codec> Drop for ConnectionGuard<S, C> {
    fn drop(&mut self) {
        let owned = self.state.hub.unregister(self.conn_id);
        if owned.is_empty() {
            return;
        }
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            for (room, player) in owned {
                tracing::debug!(
                    %conn_id,
                    room_id = %room,
                    player_id = %player,
                    "removing player of closed connection"
                );
                state.rooms.remove_player(&room, &player).await;
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, C>>,
) -> Result<(), ServerError>
where
    S: TriviaStore,
    C: Codec + Clone,
{
    let conn_id = conn.id();
    let started = Instant::now();
    let conn = Arc::new(conn);
    tracing::debug!(%conn_id, "handling new connection");

    let outbound = state.hub.register(conn_id);
    let guard = ConnectionGuard {
        conn_id,
        state: Arc::clone(&state),
    };
    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        outbound,
        state.codec.clone(),
        started,
    ));

    loop {
        // any frame, pings included, pushes the deadline out
        let remaining = state.read_timeout.saturating_sub(conn.idle_for());
        let data = match tokio::time::timeout(remaining, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Err(_) if conn.idle_for() < state.read_timeout => continue,
            Err(_) => {
                tracing::info!(%conn_id, "connection timed out");
                break;
            }
        };

        let envelope: ClientEnvelope = match state.codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                push(&state, conn_id, None, invalid_request(e.to_string()));
                continue;
            }
        };

        let seq = envelope.seq;
        if let Err(e) = envelope.request.validate() {
            tracing::debug!(%conn_id, seq, error = %e, "invalid request");
            push(&state, conn_id, Some(seq), invalid_request(e.to_string()));
            continue;
        }

        if let Err(err) = dispatch(&state, conn_id, seq, envelope.request).await {
            tracing::debug!(%conn_id, seq, error = %err, "request rejected");
            push(
                &state,
                conn_id,
                Some(seq),
                ServerEvent::Error {
                    code: err.code(),
                    message: err.to_string(),
                },
            );
        }
    }

    // Unregistering drops the outbound sender, which ends the writer.
    drop(guard);
    let _ = writer.await;
    Ok(())
}

/// Applies one validated request and queues its reply.
async fn dispatch<S, C>(
    state: &ServerState<S, C>,
    conn_id: ConnectionId,
    seq: u64,
    request: ClientRequest,
) -> Result<(), RoomError>
where
    S: TriviaStore,
    C: Codec,
{
    let reply = |event| push(state, conn_id, Some(seq), event);

    match request {
        ClientRequest::CreateRoom { room_id, trivia_id } => {
            state.rooms.create_room(room_id.clone(), trivia_id).await;
            state.hub.attach(conn_id, &room_id, None);
            let snapshot = state.rooms.snapshot(&room_id).await?;
            reply(ServerEvent::RoomState(snapshot));
        }

        ClientRequest::UpdateRoomStatus { room_id, is_active } => {
            state.rooms.set_room_open(&room_id, is_active).await?;
            state.hub.attach(conn_id, &room_id, None);
            reply(ServerEvent::Ack);
        }

        ClientRequest::JoinRoom {
            room_id,
            name,
            is_admin,
        } => {
            if let Some(owned) = state.hub.player_for(conn_id, &room_id) {
                let snapshot = state.rooms.snapshot(&room_id).await?;
                let current = snapshot.players.into_iter().find(|p| p.id == owned);
                if let Some(current) = current.filter(|p| p.name != name.trim()) {
                    reply(invalid_request(format!(
                        "already joined room {room_id} as {}",
                        current.name
                    )));
                    return Ok(());
                }
            }

            let joined = state.rooms.join_room(&room_id, &name, is_admin).await?;
            let player_id = joined.player.id;
            state.hub.attach(conn_id, &room_id, Some(player_id.clone()));
            tracing::info!(
                %conn_id,
                room_id = %room_id,
                %player_id,
                reconnected = joined.reconnected,
                "connection joined room"
            );
            reply(ServerEvent::JoinAccepted {
                room_id: room_id.clone(),
                player_id,
                reconnected: joined.reconnected,
            });

            let snapshot = state.rooms.snapshot(&room_id).await?;
            push(state, conn_id, None, ServerEvent::RoomState(snapshot));
        }

        ClientRequest::StartGame { room_id, trivia_id } => {
            state.rooms.start_game_from_store(&room_id, trivia_id).await?;
            reply(ServerEvent::Ack);
        }

        ClientRequest::SubmitAnswer { room_id, answer } => {
            let Some(player_id) = state.hub.player_for(conn_id, &room_id) else {
                reply(invalid_request(format!("not joined to room {room_id}")));
                return Ok(());
            };
            // repeats and late answers are dropped quietly; the player
            // only hears `answerSubmitted` for the one that counted
            let accepted = state.rooms.submit_answer(&room_id, &player_id, &answer).await;
            if accepted.is_none() {
                tracing::debug!(%conn_id, room_id = %room_id, %player_id, "answer ignored");
            }
            reply(ServerEvent::Ack);
        }

        ClientRequest::NextRound { room_id } => {
            state.rooms.room_info(&room_id).await?;
            let advanced = state.rooms.next_round(&room_id).await;
            tracing::debug!(%conn_id, room_id = %room_id, advanced, "manual next round");
            reply(ServerEvent::Ack);
        }

        ClientRequest::EndGame { room_id } => {
            if !state.rooms.end_game(&room_id).await {
                return Err(RoomError::NotFound(room_id));
            }
            reply(ServerEvent::Ack);
        }

        ClientRequest::GetRoomState { room_id } => {
            let snapshot = state.rooms.snapshot(&room_id).await?;
            state.hub.attach(conn_id, &room_id, None);
            reply(ServerEvent::RoomState(snapshot));
        }

        ClientRequest::LeaveRoom { room_id } => {
            if let Some(player_id) = state.hub.detach(conn_id, &room_id) {
                state.rooms.remove_player(&room_id, &player_id).await;
            }
            reply(ServerEvent::Ack);
        }

        ClientRequest::Heartbeat => reply(ServerEvent::Ack),
    }
    Ok(())
}

/// Drains a connection's outbound channel onto the socket.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    mut outbound: OutboundReceiver,
    codec: C,
    started: Instant,
) {
    let conn_id = conn.id();
    let mut seq: u64 = 1;

    while let Some(out) = outbound.recv().await {
        let envelope = ServerEnvelope {
            seq: next_seq(&mut seq),
            reply_to: out.reply_to,
            timestamp: started.elapsed().as_millis() as u64,
            event: out.event,
        };
        let bytes = match codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
            break;
        }
    }

    let _ = conn.close().await;
}

fn push<S: TriviaStore, C: Codec>(
    state: &ServerState<S, C>,
    conn_id: ConnectionId,
    reply_to: Option<u64>,
    event: ServerEvent,
) {
    state.hub.send(conn_id, Outbound { reply_to, event });
}

fn invalid_request(message: String) -> ServerEvent {
    ServerEvent::Error {
        code: ErrorCode::InvalidRequest,
        message,
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
