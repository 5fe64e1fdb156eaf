//! HTTP trigger entry points consumed from the web layer.
//!
//! Session validation happens upstream; request bodies carry the already
//! authenticated user identity.

use crate::error::CoreError;
use crate::model::{Alert, AlertDraft, AlertType, LocationSample, UserRef};
use crate::pipeline::{IngestOutcome, SweepSummary};
use crate::protocol::{JourneyMessagePayload, ServerMessage};
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/location/update", post(update_location))
        .route("/api/alerts/trigger", post(trigger_alert))
        .route("/api/journey/message", post(journey_message))
        .route("/internal/watchdog/sweep", post(run_sweep))
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoreError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Unauthorized => StatusCode::UNAUTHORIZED,
            CoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if let CoreError::Store(error) = &self {
            tracing::error!(error = %error, "persistence failure");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationUpdateRequest {
    user_id: String,
    user_name: Option<String>,
    photo_url: Option<String>,
    latitude: f64,
    longitude: f64,
    accuracy: Option<f64>,
    journey_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LocationUpdateRequest>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let sample = LocationSample {
        user_id: req.user_id.clone(),
        latitude: req.latitude,
        longitude: req.longitude,
        accuracy: req.accuracy,
        timestamp: req.timestamp.unwrap_or_else(Utc::now),
        journey_id: req.journey_id,
    };
    let user = UserRef {
        id: req.user_id,
        name: req.user_name,
        photo_url: req.photo_url,
    };

    match state.location.ingest(sample, user).await? {
        IngestOutcome::Forwarded { circles } => {
            Ok(Json(json!({ "status": "forwarded", "circles": circles })))
        }
        IngestOutcome::Suppressed => Ok(Json(json!({ "status": "suppressed" }))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerAlertRequest {
    user_id: String,
    user_name: Option<String>,
    latitude: f64,
    longitude: f64,
    address: Option<String>,
    message: Option<String>,
}

/// Creates an SOS alert and fans it out. The response reflects alert
/// creation only; partial fanout failures never fail the caller.
async fn trigger_alert(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TriggerAlertRequest>,
) -> Result<Json<Alert>, CoreError> {
    if !(-90.0..=90.0).contains(&req.latitude) || !(-180.0..=180.0).contains(&req.longitude) {
        return Err(CoreError::InvalidRequest(format!(
            "coordinates out of range: ({}, {})",
            req.latitude, req.longitude
        )));
    }

    let alert = state
        .store
        .create_alert(AlertDraft {
            kind: AlertType::Sos,
            user_id: req.user_id,
            user_name: req.user_name,
            latitude: req.latitude,
            longitude: req.longitude,
            address: req.address,
            message: req.message.unwrap_or_else(|| "SOS triggered".to_string()),
            target_circle_ids: Vec::new(),
        })
        .await
        .map_err(CoreError::Store)?;

    state.alerts.fanout(&alert).await;
    Ok(Json(alert))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JourneyMessageRequest {
    journey_id: String,
    user_id: String,
    user_name: Option<String>,
    message: String,
}

/// Broadcasts a check-in message from a traveller to their journey's
/// circles.
async fn journey_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JourneyMessageRequest>,
) -> Result<Json<serde_json::Value>, CoreError> {
    if req.message.trim().is_empty() {
        return Err(CoreError::InvalidRequest("message must not be empty".to_string()));
    }

    let journey = state
        .store
        .find_journey(&req.journey_id)
        .await
        .map_err(CoreError::Store)?
        .filter(|j| j.user_id == req.user_id)
        .ok_or_else(|| CoreError::NotFound("journey".to_string()))?;

    let message = ServerMessage::JourneyMessage(JourneyMessagePayload {
        journey_id: journey.id.clone(),
        user_id: req.user_id,
        user_name: req.user_name,
        message: req.message,
        timestamp: Utc::now(),
    });
    let mut delivered = 0;
    for circle_id in &journey.circle_ids {
        delivered += state.broadcaster.broadcast(circle_id, &message);
    }

    Ok(Json(json!({ "success": true, "delivered": delivered })))
}

/// External-scheduler entry point for the watchdog sweep.
async fn run_sweep(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SweepSummary>, CoreError> {
    if let Some(secret) = &state.config.cron_secret {
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {secret}"))
            .unwrap_or(false);
        if !authorized {
            return Err(CoreError::Unauthorized);
        }
    }

    let summary = state.watchdog.sweep().await?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, FilterConfig, WatchdogConfig};
    use crate::model::{Journey, JourneyStatus};
    use crate::push::LogPushSink;
    use crate::store::InMemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_config(cron_secret: Option<&str>) -> Config {
        Config {
            port: 0,
            host: "127.0.0.1".to_string(),
            cors_origins: vec![],
            cron_secret: cron_secret.map(|s| s.to_string()),
            filter: FilterConfig::default(),
            watchdog: WatchdogConfig::default(),
            log_level: "info".to_string(),
        }
    }

    fn app(cron_secret: Option<&str>) -> (Router, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let state = Arc::new(AppState::new(
            test_config(cron_secret),
            store.clone(),
            Arc::new(LogPushSink),
        ));
        (router().with_state(state), store)
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn post_sweep(app: &Router, bearer: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/internal/watchdog/sweep");
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = app
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn sweep_requires_bearer_secret() {
        let (app, _) = app(Some("shh"));
        let (status, _) = post_sweep(&app, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = post_sweep(&app, Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = post_sweep(&app, Some("shh")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["journeys"], 0);
        assert_eq!(body["skipped"], false);
    }

    #[tokio::test]
    async fn sweep_is_open_without_configured_secret() {
        let (app, _) = app(None);
        let (status, _) = post_sweep(&app, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn location_update_reports_forwarded_then_suppressed() {
        let (app, _) = app(None);
        let base = Utc::now();
        let body = |ts: DateTime<Utc>| {
            json!({
                "userId": "u-1",
                "userName": "Asha",
                "latitude": 12.9,
                "longitude": 77.6,
                "timestamp": ts,
            })
        };

        let (status, value) = post_json(&app, "/api/location/update", body(base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["status"], "forwarded");

        // same spot one minute later
        let (status, value) =
            post_json(&app, "/api/location/update", body(base + chrono::Duration::seconds(60)))
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["status"], "suppressed");
    }

    #[tokio::test]
    async fn location_update_rejects_bad_coordinates() {
        let (app, _) = app(None);
        let (status, value) = post_json(
            &app,
            "/api/location/update",
            json!({ "userId": "u-1", "latitude": 91.0, "longitude": 0.0 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(value["error"].as_str().unwrap().contains("out of range"));
    }

    #[tokio::test]
    async fn trigger_alert_returns_created_alert() {
        let (app, store) = app(None);
        store.add_member("circle-a", "u-1");
        let (status, value) = post_json(
            &app,
            "/api/alerts/trigger",
            json!({ "userId": "u-1", "userName": "Asha", "latitude": 12.9, "longitude": 77.6 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["type"], "sos");
        assert_eq!(value["status"], "active");
        assert_eq!(value["userId"], "u-1");
        assert_eq!(store.alerts().len(), 1);
    }

    #[tokio::test]
    async fn journey_message_is_404_for_unowned_journey() {
        let (app, store) = app(None);
        store.insert_journey(Journey {
            id: "j-1".to_string(),
            user_id: "u-2".to_string(),
            user_name: None,
            status: JourneyStatus::Active,
            expected_end: None,
            circle_ids: vec!["circle-a".to_string()],
            last_known_location: None,
        });

        let request = json!({ "journeyId": "j-1", "userId": "u-1", "message": "on my way" });
        let (status, _) = post_json(&app, "/api/journey/message", request.clone()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = post_json(&app, "/api/journey/message", json!({
            "journeyId": "j-missing", "userId": "u-1", "message": "on my way"
        }))
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // the owner gets through
        let (status, value) = post_json(&app, "/api/journey/message", json!({
            "journeyId": "j-1", "userId": "u-2", "message": "on my way"
        }))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["success"], true);
    }
}
