//! Location update pipeline: movement/heartbeat filtering, persistence and
//! circle broadcast.

use crate::broadcast::RoomBroadcaster;
use crate::config::FilterConfig;
use crate::error::CoreError;
use crate::geo;
use crate::model::{LocationSample, UserRef};
use crate::protocol::{LocationUpdatePayload, ServerMessage};
use crate::store::Persistence;
use dashmap::DashMap;
use std::sync::Arc;

/// Result of one `ingest` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Persisted and broadcast to this many circles.
    Forwarded { circles: usize },
    /// Dropped by the movement/heartbeat filter.
    Suppressed,
}

pub struct LocationPipeline {
    store: Arc<dyn Persistence>,
    broadcaster: RoomBroadcaster,
    filter: FilterConfig,
    /// Last *forwarded* sample per user. Process-local; reset on restart is
    /// acceptable (worst case one extra forwarded update).
    last_sent: DashMap<String, LocationSample>,
}

impl LocationPipeline {
    pub fn new(
        store: Arc<dyn Persistence>,
        broadcaster: RoomBroadcaster,
        filter: FilterConfig,
    ) -> Self {
        Self {
            store,
            broadcaster,
            filter,
            last_sent: DashMap::new(),
        }
    }

    /// Ingests one position sample.
    ///
    /// Compared against the last forwarded sample for the user: suppressed
    /// when it moved less than the distance threshold AND arrived inside the
    /// heartbeat window. A stationary user therefore still gets forwarded at
    /// least once per heartbeat interval. Suppression does not touch the
    /// last-sent state, so the heartbeat stays anchored to the last forward.
    pub async fn ingest(
        &self,
        sample: LocationSample,
        user: UserRef,
    ) -> Result<IngestOutcome, CoreError> {
        if !(-90.0..=90.0).contains(&sample.latitude)
            || !(-180.0..=180.0).contains(&sample.longitude)
        {
            return Err(CoreError::InvalidRequest(format!(
                "coordinates out of range: ({}, {})",
                sample.latitude, sample.longitude
            )));
        }
        if user.id != sample.user_id {
            return Err(CoreError::InvalidRequest(
                "sample user does not match authenticated user".to_string(),
            ));
        }

        // Decision taken in a block so the map guard is released before any
        // await below.
        let suppress = {
            match self.last_sent.get(&sample.user_id) {
                Some(prev) => {
                    let distance = geo::haversine_m(
                        prev.latitude,
                        prev.longitude,
                        sample.latitude,
                        sample.longitude,
                    );
                    let elapsed = (sample.timestamp - prev.timestamp).num_seconds();
                    distance < self.filter.min_distance_m
                        && elapsed < self.filter.heartbeat_secs
                }
                None => false,
            }
        };
        if suppress {
            tracing::debug!(user_id = %sample.user_id, "location update suppressed");
            return Ok(IngestOutcome::Suppressed);
        }

        self.store
            .save_location(&sample)
            .await
            .map_err(CoreError::Store)?;
        let circle_ids = self
            .store
            .find_circle_ids_for_user(&sample.user_id)
            .await
            .map_err(CoreError::Store)?;

        let message = ServerMessage::LocationUpdate(LocationUpdatePayload {
            user_id: sample.user_id.clone(),
            location: sample.clone(),
            user,
        });
        for circle_id in &circle_ids {
            self.broadcaster.broadcast(circle_id, &message);
        }

        tracing::debug!(
            user_id = %sample.user_id,
            circles = circle_ids.len(),
            "location update forwarded"
        );
        self.last_sent.insert(sample.user_id.clone(), sample);
        Ok(IngestOutcome::Forwarded {
            circles: circle_ids.len(),
        })
    }
}
