// Configuration
// Environment-driven settings (optionally from a .env file)

use std::time::Duration;

use crate::error::ConfigError;
use crate::geodesic::{DEFAULT_POLAR_LIMIT_DEG, DEFAULT_STEPS};
use crate::models::{EntryPoint, ViewState};
use crate::overlay::RingSettings;
use crate::view_state::DEFAULT_EASE;

pub const DEFAULT_SIMULATION_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_CATALOG_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ZOOM: f64 = 9.0;

/// Bengaluru, the default impact site.
pub const DEFAULT_ENTRY: (f64, f64) = (77.5946, 12.9716);

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub simulation_url: String,
    pub catalog_url: String,
    /// When set, candidates come straight from NASA NeoWs instead of `catalog_url`.
    pub nasa_api_key: Option<String>,
    pub request_timeout: Duration,
    pub ring_steps: usize,
    pub polar_limit_deg: f64,
    pub ease_duration: Duration,
    pub initial_entry: EntryPoint,
    pub initial_zoom: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            simulation_url: DEFAULT_SIMULATION_URL.to_string(),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            nasa_api_key: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            ring_steps: DEFAULT_STEPS,
            polar_limit_deg: DEFAULT_POLAR_LIMIT_DEG,
            ease_duration: DEFAULT_EASE,
            initial_entry: EntryPoint {
                longitude: DEFAULT_ENTRY.0,
                latitude: DEFAULT_ENTRY.1,
            },
            initial_zoom: DEFAULT_ZOOM,
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("IMPACT_SIMULATION_URL") {
            config.simulation_url = url;
        }
        if let Some(url) = lookup("IMPACT_CATALOG_URL") {
            config.catalog_url = url;
        }
        config.nasa_api_key = lookup("NASA_API_KEY").filter(|k| !k.trim().is_empty());

        if let Some(secs) = parse::<u64>(&lookup, "IMPACT_REQUEST_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: "IMPACT_REQUEST_TIMEOUT_SECS",
                    reason: "must be at least 1".into(),
                });
            }
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(steps) = parse::<usize>(&lookup, "IMPACT_RING_STEPS")? {
            if steps < 3 {
                return Err(ConfigError::Invalid {
                    key: "IMPACT_RING_STEPS",
                    reason: format!("a ring needs at least 3 steps, got {steps}"),
                });
            }
            config.ring_steps = steps;
        }
        if let Some(limit) = parse::<f64>(&lookup, "IMPACT_POLAR_LIMIT_DEG")? {
            if !(0.0..=90.0).contains(&limit) {
                return Err(ConfigError::Invalid {
                    key: "IMPACT_POLAR_LIMIT_DEG",
                    reason: format!("must be within [0, 90], got {limit}"),
                });
            }
            config.polar_limit_deg = limit;
        }
        if let Some(ms) = parse::<u64>(&lookup, "IMPACT_EASE_MS")? {
            config.ease_duration = Duration::from_millis(ms);
        }

        let lon = parse::<f64>(&lookup, "IMPACT_INITIAL_LON")?.unwrap_or(DEFAULT_ENTRY.0);
        let lat = parse::<f64>(&lookup, "IMPACT_INITIAL_LAT")?.unwrap_or(DEFAULT_ENTRY.1);
        config.initial_entry = EntryPoint::new(lon, lat).map_err(|e| ConfigError::Invalid {
            key: "IMPACT_INITIAL_LON/IMPACT_INITIAL_LAT",
            reason: e.to_string(),
        })?;
        if let Some(zoom) = parse::<f64>(&lookup, "IMPACT_INITIAL_ZOOM")? {
            config.initial_zoom = zoom;
        }

        Ok(config)
    }

    pub fn ring_settings(&self) -> RingSettings {
        RingSettings {
            steps: self.ring_steps,
            polar_limit_deg: self.polar_limit_deg,
        }
    }

    pub fn initial_view(&self) -> ViewState {
        ViewState::centered_on(self.initial_entry, self.initial_zoom)
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Parse { key, value: raw }),
    }
}
