//! Application state wiring.

use crate::broadcast::RoomBroadcaster;
use crate::config::Config;
use crate::pipeline::{AlertFanout, JourneyWatchdog, LocationPipeline};
use crate::push::PushSink;
use crate::registry::ConnectionRegistry;
use crate::store::Persistence;
use std::sync::Arc;

/// Global application state. All components are constructed here, once, at
/// startup; collaborators come in as injected trait objects.
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: RoomBroadcaster,
    pub location: LocationPipeline,
    pub alerts: Arc<AlertFanout>,
    pub watchdog: JourneyWatchdog,
    pub store: Arc<dyn Persistence>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Persistence>, push: Arc<dyn PushSink>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = RoomBroadcaster::new(registry.clone());
        let location = LocationPipeline::new(
            store.clone(),
            broadcaster.clone(),
            config.filter.clone(),
        );
        let alerts = Arc::new(AlertFanout::new(
            store.clone(),
            broadcaster.clone(),
            push,
        ));
        let watchdog = JourneyWatchdog::new(store.clone(), alerts.clone(), config.watchdog.clone());

        Self {
            config: Arc::new(config),
            registry,
            broadcaster,
            location,
            alerts,
            watchdog,
            store,
        }
    }
}
