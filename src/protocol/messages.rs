//! Client-server message protocol.

use crate::model::{Alert, LocationSample, UserRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client → server messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    // Connection
    Heartbeat,
    /// Binds the authenticated user id to this connection.
    Identify {
        #[serde(rename = "userId")]
        user_id: String,
    },

    // Circle rooms
    #[serde(rename = "join-circle")]
    JoinCircle {
        #[serde(rename = "circleId")]
        circle_id: String,
    },
    #[serde(rename = "leave-circle")]
    LeaveCircle {
        #[serde(rename = "circleId")]
        circle_id: String,
    },
}

/// Server → client messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    // Connection
    Connected {
        #[serde(rename = "socketId")]
        socket_id: String,
    },
    HeartbeatAck,
    Error {
        code: String,
        message: String,
    },

    // Circle events
    #[serde(rename = "location:update")]
    LocationUpdate(LocationUpdatePayload),
    #[serde(rename = "alert:new")]
    AlertNew(Alert),
    #[serde(rename = "journey:message")]
    JourneyMessage(JourneyMessagePayload),
}

/// Data for `location:update` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdatePayload {
    pub user_id: String,
    pub location: LocationSample,
    pub user: UserRef,
}

/// Data for `journey:message` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyMessagePayload {
    pub journey_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_circle_wire_format() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join-circle","payload":{"circleId":"c-1"}}"#)
                .unwrap();
        match msg {
            ClientMessage::JoinCircle { circle_id } => assert_eq!(circle_id, "c-1"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn alert_new_event_name() {
        let alert = crate::model::Alert {
            id: "a-1".into(),
            kind: crate::model::AlertType::Sos,
            user_id: "u-1".into(),
            user_name: Some("Asha".into()),
            status: crate::model::AlertStatus::Active,
            latitude: 12.9,
            longitude: 77.6,
            address: None,
            message: "SOS triggered".into(),
            created_at: Utc::now(),
            target_circle_ids: vec![],
        };
        let json = serde_json::to_value(ServerMessage::AlertNew(alert)).unwrap();
        assert_eq!(json["event"], "alert:new");
        assert_eq!(json["data"]["type"], "sos");
        assert_eq!(json["data"]["userId"], "u-1");
    }
}
