//! Connection registry: live connections and their circle-room memberships.
//!
//! The registry is the only mutable shared state in the core. Both maps are
//! dashmaps and every operation is lock-scoped and synchronous, so no guard
//! is ever held across an await. Lock order is always connections before
//! rooms.

use crate::protocol::ServerMessage;
use dashmap::DashMap;
use std::collections::HashSet;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// One live subscriber connection.
pub struct ConnectionHandle {
    sender: UnboundedSender<ServerMessage>,
    user_id: Option<String>,
    rooms: HashSet<String>,
    #[allow(dead_code)]
    connected_at: Instant,
}

/// Tracks connections and room memberships. Rooms exist implicitly as the
/// set of connections joined to an id; an empty room is removed.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionHandle>,
    rooms: DashMap<String, HashSet<String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection and returns its id.
    pub fn register(&self, sender: UnboundedSender<ServerMessage>) -> String {
        let connection_id = Uuid::new_v4().to_string();
        self.connections.insert(
            connection_id.clone(),
            ConnectionHandle {
                sender,
                user_id: None,
                rooms: HashSet::new(),
                connected_at: Instant::now(),
            },
        );
        connection_id
    }

    /// Associates an authenticated user id with a connection. No-op for an
    /// unknown connection id.
    pub fn bind_user(&self, connection_id: &str, user_id: &str) {
        if let Some(mut conn) = self.connections.get_mut(connection_id) {
            conn.user_id = Some(user_id.to_string());
        }
    }

    pub fn user_of(&self, connection_id: &str) -> Option<String> {
        self.connections
            .get(connection_id)
            .and_then(|c| c.user_id.clone())
    }

    /// Adds the connection to a room. Idempotent; no-op for an unknown
    /// connection id (it was already dropped).
    ///
    /// Both maps are written while the connection guard is held: a
    /// concurrent `drop_connection` either sees the room in the handle and
    /// cleans it, or removes the connection before the join starts and the
    /// join becomes a no-op. Releasing the guard between the two writes
    /// would let a drop slip into the gap and leave a ghost room member.
    pub fn join(&self, connection_id: &str, room_id: &str) {
        if let Some(mut conn) = self.connections.get_mut(connection_id) {
            conn.rooms.insert(room_id.to_string());
            self.rooms
                .entry(room_id.to_string())
                .or_default()
                .insert(connection_id.to_string());
        }
    }

    /// Removes the connection from a room. No-op if it never joined.
    pub fn leave(&self, connection_id: &str, room_id: &str) {
        if let Some(mut conn) = self.connections.get_mut(connection_id) {
            conn.rooms.remove(room_id);
        }
        if let Some(mut members) = self.rooms.get_mut(room_id) {
            members.remove(connection_id);
        }
        self.rooms.remove_if(room_id, |_, members| members.is_empty());
    }

    /// Removes the connection and all its memberships. Idempotent; safe to
    /// call from the transport keepalive path and from broadcast cleanup
    /// concurrently.
    pub fn drop_connection(&self, connection_id: &str) {
        let Some((_, conn)) = self.connections.remove(connection_id) else {
            return;
        };
        for room_id in &conn.rooms {
            if let Some(mut members) = self.rooms.get_mut(room_id) {
                members.remove(connection_id);
            }
            self.rooms.remove_if(room_id, |_, members| members.is_empty());
        }
    }

    /// Current members of a room, taken at call time.
    pub fn members_of(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Outbound sender for a connection, if it is still live.
    pub fn sender_of(&self, connection_id: &str) -> Option<UnboundedSender<ServerMessage>> {
        self.connections
            .get(connection_id)
            .map(|c| c.sender.clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn registry_with_conn(reg: &ConnectionRegistry) -> String {
        let (tx, _rx) = mpsc::unbounded_channel();
        reg.register(tx)
    }

    #[test]
    fn join_is_idempotent() {
        let reg = ConnectionRegistry::new();
        let id = registry_with_conn(&reg);
        reg.join(&id, "circle-a");
        reg.join(&id, "circle-a");
        assert_eq!(reg.members_of("circle-a"), vec![id]);
    }

    #[test]
    fn leave_unjoined_room_is_noop() {
        let reg = ConnectionRegistry::new();
        let id = registry_with_conn(&reg);
        reg.leave(&id, "circle-a");
        assert!(reg.members_of("circle-a").is_empty());
        assert_eq!(reg.connection_count(), 1);
    }

    #[test]
    fn members_reflect_current_state() {
        let reg = ConnectionRegistry::new();
        let a = registry_with_conn(&reg);
        let b = registry_with_conn(&reg);
        reg.join(&a, "circle-a");
        reg.join(&b, "circle-a");
        let mut members = reg.members_of("circle-a");
        members.sort();
        let mut expected = vec![a.clone(), b.clone()];
        expected.sort();
        assert_eq!(members, expected);

        reg.leave(&a, "circle-a");
        assert_eq!(reg.members_of("circle-a"), vec![b]);
    }

    #[test]
    fn drop_connection_removes_all_memberships() {
        let reg = ConnectionRegistry::new();
        let id = registry_with_conn(&reg);
        reg.join(&id, "circle-a");
        reg.join(&id, "circle-b");
        reg.drop_connection(&id);
        assert!(reg.members_of("circle-a").is_empty());
        assert!(reg.members_of("circle-b").is_empty());
        assert_eq!(reg.connection_count(), 0);
        // empty rooms are cleaned up, not left stale
        assert_eq!(reg.room_count(), 0);
    }

    #[test]
    fn drop_connection_is_idempotent() {
        let reg = ConnectionRegistry::new();
        let id = registry_with_conn(&reg);
        reg.join(&id, "circle-a");
        reg.drop_connection(&id);
        reg.drop_connection(&id);
        assert_eq!(reg.connection_count(), 0);
    }

    #[test]
    fn operations_on_unknown_connection_are_noops() {
        let reg = ConnectionRegistry::new();
        reg.join("ghost", "circle-a");
        reg.leave("ghost", "circle-a");
        reg.bind_user("ghost", "u-1");
        assert!(reg.members_of("circle-a").is_empty());
        assert_eq!(reg.room_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_join_and_drop_leave_no_stale_members() {
        let reg = std::sync::Arc::new(ConnectionRegistry::new());
        for _ in 0..200 {
            let (tx, _rx) = mpsc::unbounded_channel();
            let id = reg.register(tx);

            let joiner = {
                let reg = reg.clone();
                let id = id.clone();
                tokio::spawn(async move { reg.join(&id, "circle-a") })
            };
            let dropper = {
                let reg = reg.clone();
                let id = id.clone();
                tokio::spawn(async move { reg.drop_connection(&id) })
            };
            joiner.await.unwrap();
            dropper.await.unwrap();

            assert_eq!(reg.connection_count(), 0);
            assert!(
                reg.members_of("circle-a").is_empty(),
                "stale member left after disconnect: {:?}",
                reg.members_of("circle-a")
            );
            assert_eq!(reg.room_count(), 0);
        }
    }

    #[test]
    fn bind_user_roundtrip() {
        let reg = ConnectionRegistry::new();
        let id = registry_with_conn(&reg);
        assert_eq!(reg.user_of(&id), None);
        reg.bind_user(&id, "u-1");
        assert_eq!(reg.user_of(&id), Some("u-1".to_string()));
    }
}
