//! Environment-variable based configuration.

use std::env;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    #[allow(dead_code)]
    pub cors_origins: Vec<String>,
    /// Bearer secret for the external-scheduler sweep endpoint. When unset,
    /// the endpoint is open (development only).
    pub cron_secret: Option<String>,
    pub filter: FilterConfig,
    pub watchdog: WatchdogConfig,
    pub log_level: String,
}

/// Location update suppression thresholds.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Movement below this distance is considered stationary (meters).
    pub min_distance_m: f64,
    /// Forced forward interval for stationary users (seconds).
    pub heartbeat_secs: i64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_distance_m: 10.0,
            heartbeat_secs: 300,
        }
    }
}

/// Journey watchdog windows.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// In-process sweep period (seconds). 0 disables the internal timer;
    /// sweeps then come only from the external scheduler endpoint.
    pub interval_secs: u64,
    /// Grace period past a journey's expected end before a delayed alert (seconds).
    pub grace_secs: i64,
    /// Age of the newest location sample before a stationary alert (seconds).
    pub stale_secs: i64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            grace_secs: 900,
            stale_secs: 900,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "5600".to_string())
                .parse()
                .unwrap_or(5600),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            cron_secret: env::var("CRON_SECRET").ok().filter(|s| !s.is_empty()),
            filter: FilterConfig {
                min_distance_m: env::var("LOCATION_MIN_DISTANCE_M")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10.0),
                heartbeat_secs: env::var("LOCATION_HEARTBEAT")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
            },
            watchdog: WatchdogConfig {
                interval_secs: env::var("WATCHDOG_INTERVAL")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
                grace_secs: env::var("WATCHDOG_GRACE")
                    .unwrap_or_else(|_| "900".to_string())
                    .parse()
                    .unwrap_or(900),
                stale_secs: env::var("WATCHDOG_STALE")
                    .unwrap_or_else(|_| "900".to_string())
                    .parse()
                    .unwrap_or(900),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}
