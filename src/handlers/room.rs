//! Circle room membership handlers.

use crate::protocol::ServerMessage;
use crate::state::AppState;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Joins the connection to a circle room. Idempotent.
pub fn handle_join_circle(
    state: &Arc<AppState>,
    connection_id: &str,
    sender: &UnboundedSender<ServerMessage>,
    circle_id: &str,
) {
    let circle_id = circle_id.trim();
    if circle_id.is_empty() {
        let _ = sender.send(ServerMessage::Error {
            code: "invalid_circle".to_string(),
            message: "circle id must not be empty".to_string(),
        });
        return;
    }

    state.registry.join(connection_id, circle_id);
    tracing::info!(
        connection_id = %connection_id,
        circle_id = %circle_id,
        members = state.registry.members_of(circle_id).len(),
        "Joined circle room"
    );
}

/// Removes the connection from a circle room. No-op if it never joined.
pub fn handle_leave_circle(state: &Arc<AppState>, connection_id: &str, circle_id: &str) {
    let circle_id = circle_id.trim();
    if circle_id.is_empty() {
        return;
    }

    state.registry.leave(connection_id, circle_id);
    tracing::info!(
        connection_id = %connection_id,
        circle_id = %circle_id,
        "Left circle room"
    );
}
