//! Persistence boundary.
//!
//! The core never talks to a database directly; everything goes through the
//! `Persistence` trait so the realtime pipelines stay testable and the
//! storage backend swappable. `InMemoryStore` backs development and tests;
//! production wires a database adapter at the same injection point.

use crate::model::{
    Alert, AlertDraft, AlertStatus, AlertType, Journey, JourneyStatus, LocationSample,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[async_trait]
pub trait Persistence: Send + Sync {
    async fn save_location(&self, sample: &LocationSample) -> Result<()>;
    async fn find_circle_ids_for_user(&self, user_id: &str) -> Result<Vec<String>>;
    async fn find_member_user_ids(&self, circle_id: &str) -> Result<Vec<String>>;
    async fn find_push_tokens(&self, user_ids: &[String]) -> Result<HashMap<String, String>>;
    async fn create_alert(&self, draft: AlertDraft) -> Result<Alert>;
    async fn find_active_alert(&self, user_id: &str, kind: AlertType) -> Result<Option<Alert>>;
    async fn list_active_journeys(&self) -> Result<Vec<Journey>>;
    async fn find_journey(&self, journey_id: &str) -> Result<Option<Journey>>;
    async fn latest_location_for_journey(
        &self,
        journey_id: &str,
    ) -> Result<Option<LocationSample>>;
}

/// In-memory `Persistence` implementation.
#[derive(Default)]
pub struct InMemoryStore {
    circles_by_user: DashMap<String, Vec<String>>,
    members_by_circle: DashMap<String, Vec<String>>,
    push_tokens: DashMap<String, String>,
    alerts: DashMap<String, Alert>,
    journeys: DashMap<String, Journey>,
    locations: Mutex<Vec<LocationSample>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user to a circle, updating both directions of the membership.
    pub fn add_member(&self, circle_id: &str, user_id: &str) {
        let mut circles = self.circles_by_user.entry(user_id.to_string()).or_default();
        if !circles.contains(&circle_id.to_string()) {
            circles.push(circle_id.to_string());
        }
        drop(circles);
        let mut members = self
            .members_by_circle
            .entry(circle_id.to_string())
            .or_default();
        if !members.contains(&user_id.to_string()) {
            members.push(user_id.to_string());
        }
    }

    pub fn set_push_token(&self, user_id: &str, token: &str) {
        self.push_tokens
            .insert(user_id.to_string(), token.to_string());
    }

    pub fn insert_journey(&self, journey: Journey) {
        self.journeys.insert(journey.id.clone(), journey);
    }

    /// Transitions an alert out of (or back into) `active`; stands in for
    /// the external alert-resolution flow.
    pub fn set_alert_status(&self, alert_id: &str, status: AlertStatus) {
        if let Some(mut alert) = self.alerts.get_mut(alert_id) {
            alert.status = status;
        }
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.iter().map(|a| a.value().clone()).collect()
    }

    pub fn location_count(&self) -> usize {
        self.locations.lock().unwrap().len()
    }
}

#[async_trait]
impl Persistence for InMemoryStore {
    async fn save_location(&self, sample: &LocationSample) -> Result<()> {
        self.locations.lock().unwrap().push(sample.clone());
        Ok(())
    }

    async fn find_circle_ids_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(self
            .circles_by_user
            .get(user_id)
            .map(|c| c.clone())
            .unwrap_or_default())
    }

    async fn find_member_user_ids(&self, circle_id: &str) -> Result<Vec<String>> {
        Ok(self
            .members_by_circle
            .get(circle_id)
            .map(|m| m.clone())
            .unwrap_or_default())
    }

    async fn find_push_tokens(&self, user_ids: &[String]) -> Result<HashMap<String, String>> {
        Ok(user_ids
            .iter()
            .filter_map(|id| {
                self.push_tokens
                    .get(id)
                    .map(|token| (id.clone(), token.clone()))
            })
            .collect())
    }

    async fn create_alert(&self, draft: AlertDraft) -> Result<Alert> {
        let alert = Alert {
            id: Uuid::new_v4().to_string(),
            kind: draft.kind,
            user_id: draft.user_id,
            user_name: draft.user_name,
            status: AlertStatus::Active,
            latitude: draft.latitude,
            longitude: draft.longitude,
            address: draft.address,
            message: draft.message,
            created_at: Utc::now(),
            target_circle_ids: draft.target_circle_ids,
        };
        self.alerts.insert(alert.id.clone(), alert.clone());
        Ok(alert)
    }

    async fn find_active_alert(&self, user_id: &str, kind: AlertType) -> Result<Option<Alert>> {
        Ok(self.alerts.iter().find_map(|entry| {
            let alert = entry.value();
            (alert.user_id == user_id
                && alert.kind == kind
                && alert.status == AlertStatus::Active)
                .then(|| alert.clone())
        }))
    }

    async fn list_active_journeys(&self) -> Result<Vec<Journey>> {
        Ok(self
            .journeys
            .iter()
            .filter(|j| j.status == JourneyStatus::Active)
            .map(|j| j.value().clone())
            .collect())
    }

    async fn find_journey(&self, journey_id: &str) -> Result<Option<Journey>> {
        Ok(self.journeys.get(journey_id).map(|j| j.clone()))
    }

    async fn latest_location_for_journey(
        &self,
        journey_id: &str,
    ) -> Result<Option<LocationSample>> {
        Ok(self
            .locations
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.journey_id.as_deref() == Some(journey_id))
            .max_by_key(|s| s.timestamp)
            .cloned())
    }
}
