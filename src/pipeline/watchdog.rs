//! Journey watchdog: periodic sweep over active journeys that raises
//! delayed and loss-of-movement alerts through the fanout pipeline.

use crate::config::WatchdogConfig;
use crate::error::CoreError;
use crate::model::{AlertDraft, AlertType, GeoPoint, Journey};
use crate::pipeline::alert::AlertFanout;
use crate::store::Persistence;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Outcome of one sweep tick.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepSummary {
    pub journeys: usize,
    pub alerts_created: usize,
    pub errors: usize,
    /// True when the tick was skipped because a previous sweep was still
    /// running.
    pub skipped: bool,
}

pub struct JourneyWatchdog {
    store: Arc<dyn Persistence>,
    fanout: Arc<AlertFanout>,
    config: WatchdogConfig,
    /// Single-flight guard: overlapping ticks (internal timer plus the
    /// external scheduler endpoint) must never sweep concurrently.
    gate: Mutex<()>,
}

impl JourneyWatchdog {
    pub fn new(
        store: Arc<dyn Persistence>,
        fanout: Arc<AlertFanout>,
        config: WatchdogConfig,
    ) -> Self {
        Self {
            store,
            fanout,
            config,
            gate: Mutex::new(()),
        }
    }

    /// Runs one sweep over all active journeys.
    ///
    /// Stateless across ticks apart from the existence-based deduplication:
    /// a condition stays suppressed while an alert of the same type is still
    /// `active` for the user. A per-journey failure is counted and the sweep
    /// continues; only failing to list the journeys is fatal.
    pub async fn sweep(&self) -> Result<SweepSummary, CoreError> {
        let Ok(_guard) = self.gate.try_lock() else {
            tracing::info!("sweep still running, skipping tick");
            return Ok(SweepSummary {
                skipped: true,
                ..SweepSummary::default()
            });
        };

        let now = Utc::now();
        let journeys = self
            .store
            .list_active_journeys()
            .await
            .map_err(CoreError::Store)?;

        let mut summary = SweepSummary {
            journeys: journeys.len(),
            ..SweepSummary::default()
        };
        for journey in &journeys {
            match self.check_journey(journey, now).await {
                Ok(created) => summary.alerts_created += created,
                Err(error) => {
                    tracing::error!(
                        journey_id = %journey.id,
                        error = %error,
                        "journey check failed, continuing sweep"
                    );
                    summary.errors += 1;
                }
            }
        }

        tracing::info!(
            journeys = summary.journeys,
            alerts_created = summary.alerts_created,
            errors = summary.errors,
            "watchdog sweep complete"
        );
        Ok(summary)
    }

    async fn check_journey(
        &self,
        journey: &Journey,
        now: DateTime<Utc>,
    ) -> Result<usize, CoreError> {
        let mut created = 0;

        // Delayed: past expected arrival plus the grace window.
        if let Some(expected_end) = journey.expected_end {
            if now > expected_end + Duration::seconds(self.config.grace_secs) {
                let name = display_name(journey);
                let location = journey
                    .last_known_location
                    .unwrap_or(GeoPoint {
                        latitude: 0.0,
                        longitude: 0.0,
                    });
                let message = format!(
                    "Journey delayed! {} was expected to arrive by {}.",
                    name,
                    expected_end.format("%H:%M")
                );
                created += self
                    .raise_alert(journey, AlertType::JourneyDelayed, location, message)
                    .await?;
            }
        }

        // Stationary: newest sample for the journey is too old. A journey
        // with no samples yet has nothing to compare against.
        if let Some(last) = self
            .store
            .latest_location_for_journey(&journey.id)
            .await
            .map_err(CoreError::Store)?
        {
            if now - last.timestamp > Duration::seconds(self.config.stale_secs) {
                let message = format!(
                    "No movement detected for {} minutes from {}.",
                    self.config.stale_secs / 60,
                    display_name(journey)
                );
                let location = GeoPoint {
                    latitude: last.latitude,
                    longitude: last.longitude,
                };
                created += self
                    .raise_alert(journey, AlertType::JourneyStationary, location, message)
                    .await?;
            }
        }

        Ok(created)
    }

    /// Creates and fans out one alert unless an active alert of the same
    /// type already exists for the journey's user.
    async fn raise_alert(
        &self,
        journey: &Journey,
        kind: AlertType,
        location: GeoPoint,
        message: String,
    ) -> Result<usize, CoreError> {
        let existing = self
            .store
            .find_active_alert(&journey.user_id, kind)
            .await
            .map_err(CoreError::Store)?;
        if existing.is_some() {
            return Ok(0);
        }

        let alert = self
            .store
            .create_alert(AlertDraft {
                kind,
                user_id: journey.user_id.clone(),
                user_name: journey.user_name.clone(),
                latitude: location.latitude,
                longitude: location.longitude,
                address: None,
                message,
                target_circle_ids: journey.circle_ids.clone(),
            })
            .await
            .map_err(CoreError::Store)?;

        tracing::info!(
            alert_id = %alert.id,
            journey_id = %journey.id,
            kind = ?kind,
            "watchdog raised alert"
        );
        self.fanout.fanout(&alert).await;
        Ok(1)
    }
}

fn display_name(journey: &Journey) -> &str {
    journey.user_name.as_deref().unwrap_or("A circle member")
}
