//! Room broadcaster: best-effort fanout of one event to every connection in
//! a room.

use crate::protocol::ServerMessage;
use crate::registry::ConnectionRegistry;
use std::sync::Arc;

/// Delivers events to the current members of a room. Explicitly constructed
/// and injected at startup; cheap to clone.
#[derive(Clone)]
pub struct RoomBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl RoomBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Sends `message` to every connection currently joined to `room_id`.
    /// Returns the number of connections the message was handed to.
    ///
    /// Delivery per connection is independent: a closed-socket race on one
    /// connection is logged and the connection dropped from the registry,
    /// without affecting the others or the caller. A room with no members is
    /// a no-op. Sends go through each connection's unbounded channel, so
    /// messages from one origin arrive in issue order.
    pub fn broadcast(&self, room_id: &str, message: &ServerMessage) -> usize {
        let members = self.registry.members_of(room_id);
        if members.is_empty() {
            tracing::trace!(room_id = %room_id, "broadcast to empty room, skipping");
            return 0;
        }

        let mut delivered = 0;
        let mut dead: Vec<String> = Vec::new();
        for connection_id in members {
            match self.registry.sender_of(&connection_id) {
                Some(sender) => {
                    if sender.send(message.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        dead.push(connection_id);
                    }
                }
                // dropped between the membership snapshot and the send
                None => {}
            }
        }

        for connection_id in dead {
            tracing::warn!(
                connection_id = %connection_id,
                room_id = %room_id,
                "send to closed connection, dropping from registry"
            );
            self.registry.drop_connection(&connection_id);
        }

        delivered
    }
}
