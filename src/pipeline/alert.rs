//! Alert fanout pipeline: one alert in, socket broadcasts and push
//! notifications out.
//!
//! Single origination point for every alert source (user-triggered SOS and
//! watchdog-synthesized alerts alike), so socket and push delivery stay
//! consistent across paths.

use crate::broadcast::RoomBroadcaster;
use crate::model::{Alert, AlertType};
use crate::protocol::ServerMessage;
use crate::push::PushSink;
use crate::store::Persistence;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Delivery tally for one fanout. Observability only; fanout never fails as
/// a whole.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanoutReport {
    /// Target circles resolved.
    pub circles: usize,
    /// Connections the socket broadcast reached.
    pub delivered: usize,
    pub push_success: usize,
    pub push_failure: usize,
    /// Per-item lookup failures that were isolated and skipped.
    pub errors: usize,
}

pub struct AlertFanout {
    store: Arc<dyn Persistence>,
    broadcaster: RoomBroadcaster,
    push: Arc<dyn PushSink>,
}

impl AlertFanout {
    pub fn new(
        store: Arc<dyn Persistence>,
        broadcaster: RoomBroadcaster,
        push: Arc<dyn PushSink>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            push,
        }
    }

    /// Fans one alert out to its target circles and their members.
    ///
    /// Per-circle and per-recipient failures are isolated: one circle's
    /// lookup failure or one token's push failure never aborts delivery to
    /// the rest. The alert itself is never mutated here.
    pub async fn fanout(&self, alert: &Alert) -> FanoutReport {
        let mut report = FanoutReport::default();

        let circle_ids: Vec<String> = if !alert.target_circle_ids.is_empty() {
            alert.target_circle_ids.clone()
        } else {
            match self.store.find_circle_ids_for_user(&alert.user_id).await {
                Ok(ids) => ids,
                Err(error) => {
                    tracing::error!(
                        alert_id = %alert.id,
                        error = %error,
                        "failed to resolve target circles, fanout skipped"
                    );
                    report.errors += 1;
                    return report;
                }
            }
        };
        if circle_ids.is_empty() {
            tracing::warn!(alert_id = %alert.id, "alert has no target circles");
            return report;
        }
        report.circles = circle_ids.len();

        // Socket broadcast per circle. Best-effort per connection already;
        // an empty room is a no-op.
        let message = ServerMessage::AlertNew(alert.clone());
        for circle_id in &circle_ids {
            report.delivered += self.broadcaster.broadcast(circle_id, &message);
        }

        // Recipients: union of circle members, minus the originator.
        // Lookups run concurrently; failures are counted and skipped.
        let member_results = join_all(
            circle_ids
                .iter()
                .map(|circle_id| self.store.find_member_user_ids(circle_id)),
        )
        .await;
        let mut recipients: HashSet<String> = HashSet::new();
        for (circle_id, result) in circle_ids.iter().zip(member_results) {
            match result {
                Ok(user_ids) => recipients.extend(user_ids),
                Err(error) => {
                    tracing::warn!(
                        circle_id = %circle_id,
                        error = %error,
                        "member lookup failed, skipping circle for push"
                    );
                    report.errors += 1;
                }
            }
        }
        recipients.remove(&alert.user_id);
        if recipients.is_empty() {
            self.log_report(alert, &report);
            return report;
        }

        let recipient_ids: Vec<String> = recipients.into_iter().collect();
        let tokens: Vec<String> = match self.store.find_push_tokens(&recipient_ids).await {
            Ok(token_map) => token_map.into_values().collect(),
            Err(error) => {
                tracing::warn!(alert_id = %alert.id, error = %error, "push token lookup failed");
                report.errors += 1;
                self.log_report(alert, &report);
                return report;
            }
        };
        if !tokens.is_empty() {
            let (title, body) = push_copy(alert);
            let data = HashMap::from([
                ("alertId".to_string(), alert.id.clone()),
                ("type".to_string(), alert_type_str(alert.kind).to_string()),
            ]);
            let tally = self.push.send_push(&tokens, &title, &body, &data).await;
            report.push_success = tally.success;
            report.push_failure = tally.failure;
        }

        self.log_report(alert, &report);
        report
    }

    fn log_report(&self, alert: &Alert, report: &FanoutReport) {
        tracing::info!(
            alert_id = %alert.id,
            circles = report.circles,
            delivered = report.delivered,
            push_success = report.push_success,
            push_failure = report.push_failure,
            errors = report.errors,
            "alert fanout complete"
        );
    }
}

fn alert_type_str(kind: AlertType) -> &'static str {
    match kind {
        AlertType::Sos => "sos",
        AlertType::JourneyDelayed => "journey_delayed",
        AlertType::JourneyStationary => "journey_stationary",
    }
}

fn push_copy(alert: &Alert) -> (String, String) {
    let name = alert.user_name.as_deref().unwrap_or("Someone");
    match alert.kind {
        AlertType::Sos => ("SOS Alert!".to_string(), format!("{name} needs help!")),
        AlertType::JourneyDelayed => ("Journey Delayed".to_string(), alert.message.clone()),
        AlertType::JourneyStationary => {
            ("No Movement Detected".to_string(), alert.message.clone())
        }
    }
}
