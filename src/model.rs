//! Core data model: location samples, alerts, journeys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One position report from a client. Ephemeral: the core only retains the
/// last forwarded sample per user for the filtering decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
    /// Set while the user has an active journey; links the sample for the
    /// watchdog's stationary check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journey_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Sos,
    JourneyDelayed,
    JourneyStationary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Cancelled,
    Resolved,
}

/// A triggered or synthesized alert. Immutable once handed to fanout; status
/// transitions happen in the external store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AlertType,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub status: AlertStatus,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// Circles to deliver to. Empty means "resolve from the originator's
    /// memberships at fanout time".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_circle_ids: Vec<String>,
}

/// Input to `Persistence::create_alert`; the store assigns id, status and
/// creation time.
#[derive(Debug, Clone)]
pub struct AlertDraft {
    pub kind: AlertType,
    pub user_id: String,
    pub user_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub message: String,
    pub target_circle_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Read-only journey view for the watchdog. The watchdog never writes journey
/// state; it only emits alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journey {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub status: JourneyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_end: Option<DateTime<Utc>>,
    pub circle_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_known_location: Option<GeoPoint>,
}

/// Minimal display info attached to outbound location updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}
