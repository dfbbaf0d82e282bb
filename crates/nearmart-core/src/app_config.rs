use std::path::PathBuf;
use std::time::Duration;

use crate::{Coordinates, LocationInfo};

/// Runtime configuration for the discovery engine and its collaborators.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub log_level: String,
    pub radius_km: f64,
    pub movement_threshold_km: f64,
    pub tick_interval_ms: u64,
    /// Automatic location re-poll period; `0` disables re-polling.
    pub location_repoll_secs: u64,
    pub location_timeout_ms: u64,
    pub location_max_age_ms: u64,
    pub default_location: LocationInfo,
    pub map_zoom: u8,
    pub geocoder_url: String,
    pub geocoder_timeout_secs: u64,
    pub geocoder_user_agent: String,
    pub geocoder_max_retries: u32,
    pub listings_path: PathBuf,
}

impl EngineConfig {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[must_use]
    pub fn location_timeout(&self) -> Duration {
        Duration::from_millis(self.location_timeout_ms)
    }

    #[must_use]
    pub fn location_max_age(&self) -> Duration {
        Duration::from_millis(self.location_max_age_ms)
    }

    #[must_use]
    pub fn location_repoll(&self) -> Option<Duration> {
        (self.location_repoll_secs > 0).then(|| Duration::from_secs(self.location_repoll_secs))
    }

    #[must_use]
    pub fn default_coordinates(&self) -> Coordinates {
        self.default_location.coordinates
    }
}
