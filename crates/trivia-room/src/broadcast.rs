//! The outbound seam between rooms and connections.

use trivia_protocol::{Recipient, RoomCode, ServerEvent};

/// Fans room events out to connected clients.
///
/// Called from inside room actors, so implementations must not block:
/// queue the event and return. Delivery to a client that has gone away
/// is dropped silently.
pub trait Broadcaster: Send + Sync + 'static {
    /// Delivers `event` to `to` within `room`.
    fn deliver(&self, room: &RoomCode, to: Recipient, event: ServerEvent);
}
