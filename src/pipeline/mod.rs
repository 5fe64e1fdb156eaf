//! Processing pipelines: location ingest, alert fanout, journey watchdog.

pub mod alert;
pub mod location;
pub mod watchdog;

pub use alert::{AlertFanout, FanoutReport};
pub use location::{IngestOutcome, LocationPipeline};
pub use watchdog::{JourneyWatchdog, SweepSummary};
