//! Connection hub: which connection watches which room, and as whom.
//!
//! The hub is the server's [`Broadcaster`]. Room actors hand it events
//! and it pushes them onto the outbound channel of every matching
//! connection. Each connection's writer task drains that channel, so a
//! room never waits on a slow socket.

use dashmap::DashMap;
use tokio::sync::mpsc;
use trivia_protocol::{PlayerId, Recipient, RoomCode, ServerEvent};
use trivia_room::Broadcaster;
use trivia_transport::ConnectionId;

/// One event queued for a connection's writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Outbound {
    /// `seq` of the request this answers; `None` for pushed events.
    pub(crate) reply_to: Option<u64>,
    pub(crate) event: ServerEvent,
}

pub(crate) type OutboundSender = mpsc::UnboundedSender<Outbound>;
pub(crate) type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

/// A connection's link to one room. `player` is set once the connection
/// joined as a player; operators watching the room have none.
#[derive(Debug, Clone)]
struct Membership {
    room: RoomCode,
    player: Option<PlayerId>,
}

#[derive(Debug)]
struct ConnectionEntry {
    sender: OutboundSender,
    memberships: Vec<Membership>,
}

/// Registry of live connections and their room memberships.
#[derive(Debug, Default)]
pub struct ConnectionHub {
    connections: DashMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Registers a connection and returns the receiving end of its
    /// outbound channel.
    pub(crate) fn register(&self, conn: ConnectionId) -> OutboundReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(
            conn,
            ConnectionEntry {
                sender: tx,
                memberships: Vec::new(),
            },
        );
        rx
    }

    /// Forgets a connection. Returns the players it owned, so the caller
    /// can remove them from their rooms.
    pub(crate) fn unregister(&self, conn: ConnectionId) -> Vec<(RoomCode, PlayerId)> {
        let Some((_, entry)) = self.connections.remove(&conn) else {
            return Vec::new();
        };
        entry
            .memberships
            .into_iter()
            .filter_map(|m| m.player.map(|player| (m.room, player)))
            .collect()
    }

    /// Links `conn` to `room`, optionally as `player`.
    ///
    /// Taking a player id detaches it from any other connection first, so
    /// the old connection closing later does not remove the player.
    pub(crate) fn attach(
        &self,
        conn: ConnectionId,
        room: &RoomCode,
        player: Option<PlayerId>,
    ) {
        if let Some(player) = &player {
            for mut other in self.connections.iter_mut() {
                let other_conn = *other.key();
                if other_conn == conn {
                    continue;
                }
                for m in other.memberships.iter_mut() {
                    if &m.room == room && m.player.as_ref() == Some(player) {
                        tracing::debug!(
                            room_id = %room,
                            player_id = %player,
                            from = %other_conn,
                            to = %conn,
                            "player moved to new connection"
                        );
                        m.player = None;
                    }
                }
            }
        }

        let Some(mut entry) = self.connections.get_mut(&conn) else {
            return;
        };
        match entry.memberships.iter_mut().find(|m| &m.room == room) {
            Some(existing) => {
                if player.is_some() {
                    existing.player = player;
                }
            }
            None => entry.memberships.push(Membership {
                room: room.clone(),
                player,
            }),
        }
    }

    /// Unlinks `conn` from `room`. Returns the player it owned there.
    pub(crate) fn detach(&self, conn: ConnectionId, room: &RoomCode) -> Option<PlayerId> {
        let mut entry = self.connections.get_mut(&conn)?;
        let index = entry.memberships.iter().position(|m| &m.room == room)?;
        entry.memberships.remove(index).player
    }

    /// The player `conn` joined `room` as, if any.
    pub(crate) fn player_for(&self, conn: ConnectionId, room: &RoomCode) -> Option<PlayerId> {
        self.connections
            .get(&conn)?
            .memberships
            .iter()
            .find(|m| &m.room == room)
            .and_then(|m| m.player.clone())
    }

    /// Drops every membership in `room`, e.g. after it was evicted.
    pub(crate) fn forget_room(&self, room: &RoomCode) {
        for mut entry in self.connections.iter_mut() {
            entry.memberships.retain(|m| &m.room != room);
        }
    }

    /// Queues an event for one connection. Returns `false` if the
    /// connection is gone.
    pub(crate) fn send(&self, conn: ConnectionId, outbound: Outbound) -> bool {
        self.connections
            .get(&conn)
            .is_some_and(|entry| entry.sender.send(outbound).is_ok())
    }
}

impl Broadcaster for ConnectionHub {
    fn deliver(&self, room: &RoomCode, to: Recipient, event: ServerEvent) {
        let mut delivered = 0usize;
        for entry in self.connections.iter() {
            let matches = entry.memberships.iter().any(|m| {
                &m.room == room
                    && match &to {
                        Recipient::Room => true,
                        Recipient::Player(id) => m.player.as_ref() == Some(id),
                    }
            });
            if matches {
                let outbound = Outbound {
                    reply_to: None,
                    event: event.clone(),
                };
                if entry.sender.send(outbound).is_ok() {
                    delivered += 1;
                }
            }
        }
        tracing::trace!(room_id = %room, ?to, delivered, "event delivered");
    }
}
