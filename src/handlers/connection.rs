//! Connection lifecycle handlers.

use crate::protocol::ServerMessage;
use crate::state::AppState;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Registers a new connection and acknowledges it with its socket id.
pub fn handle_connection(state: &Arc<AppState>, sender: UnboundedSender<ServerMessage>) -> String {
    let connection_id = state.registry.register(sender.clone());

    let _ = sender.send(ServerMessage::Connected {
        socket_id: connection_id.clone(),
    });

    tracing::info!(connection_id = %connection_id, "New connection established");
    connection_id
}

/// Drops the connection and all its circle memberships. Idempotent, so the
/// transport keepalive path and broadcast cleanup can both call it.
pub fn handle_disconnect(state: &Arc<AppState>, connection_id: &str) {
    let user_id = state.registry.user_of(connection_id);
    state.registry.drop_connection(connection_id);
    tracing::info!(connection_id = %connection_id, user_id = ?user_id, "Connection closed");
}

/// Binds the authenticated user id to this connection.
pub fn handle_identify(state: &Arc<AppState>, connection_id: &str, user_id: &str) {
    state.registry.bind_user(connection_id, user_id);
    tracing::debug!(connection_id = %connection_id, user_id = %user_id, "Connection identified");
}

pub fn handle_heartbeat(sender: &UnboundedSender<ServerMessage>) {
    let _ = sender.send(ServerMessage::HeartbeatAck);
}
