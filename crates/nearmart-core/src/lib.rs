//! Shared data model, distance math, and configuration for the nearmart
//! discovery engine.

pub mod app_config;
pub mod config;
pub mod geo;
pub mod listings;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use app_config::EngineConfig;
pub use config::{build_engine_config, load_engine_config, load_engine_config_from_env};
pub use geo::{distance_km, format_distance, EARTH_RADIUS_KM};
pub use listings::{load_listings, parse_listings, ListingEntry, ListingsFile};

/// Marker id reserved for the user's own position on the map.
///
/// Listing ids are assigned by the listings store and must never collide
/// with this value; listing files using it are rejected on load.
pub const SELF_MARKER_ID: &str = "__self__";

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// `true` when both components are finite and inside the WGS84 range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lng)
    }
}

/// Human-readable place returned by a reverse geocoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceAddress {
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

pub const UNKNOWN_CITY: &str = "Unknown City";
pub const UNKNOWN_STATE: &str = "Unknown State";
pub const UNKNOWN_COUNTRY: &str = "Unknown Country";

/// A resolved user location. Always replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub coordinates: Coordinates,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

impl LocationInfo {
    #[must_use]
    pub fn from_place(coordinates: Coordinates, place: PlaceAddress) -> Self {
        Self {
            coordinates,
            address: place.address,
            city: place.city,
            state: place.state,
            country: place.country,
        }
    }

    /// Location with the coordinate string as its address and placeholder
    /// place names. Used when reverse geocoding fails.
    #[must_use]
    pub fn coordinate_only(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            address: coordinates.to_string(),
            city: UNKNOWN_CITY.to_string(),
            state: UNKNOWN_STATE.to_string(),
            country: UNKNOWN_COUNTRY.to_string(),
        }
    }

    /// Short label shown in the header, e.g. `"Delhi, Delhi"`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}, {}", self.city, self.state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Sold,
    Expired,
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingStatus::Active => write!(f, "active"),
            ListingStatus::Sold => write!(f, "sold"),
            ListingStatus::Expired => write!(f, "expired"),
        }
    }
}

/// A marketplace listing as seen by the engine. Read-only input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub coordinates: Coordinates,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub seller_name: Option<String>,
}

/// A listing annotated with its distance from the current origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyListing {
    pub listing: Listing,
    /// Great-circle distance in kilometres, rounded to one decimal.
    pub distance_km: f64,
}

impl NearbyListing {
    #[must_use]
    pub fn formatted_distance(&self) -> String {
        format_distance(self.distance_km)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read listings file {path}: {source}")]
    ListingsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse listings file: {0}")]
    ListingsFileParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_display_uses_four_decimals() {
        assert_eq!(Coordinates::new(28.704_06, 77.102_49).to_string(), "28.7041, 77.1025");
    }

    #[test]
    fn coordinates_reject_out_of_range_and_nan() {
        assert!(Coordinates::new(28.7, 77.1).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -180.5).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn coordinate_only_location_uses_placeholders() {
        let info = LocationInfo::coordinate_only(Coordinates::new(12.5, -3.25));
        assert_eq!(info.address, "12.5000, -3.2500");
        assert_eq!(info.city, UNKNOWN_CITY);
        assert_eq!(info.state, UNKNOWN_STATE);
        assert_eq!(info.country, UNKNOWN_COUNTRY);
    }

    #[test]
    fn location_label_joins_city_and_state() {
        let info = LocationInfo::from_place(
            Coordinates::new(28.7, 77.1),
            PlaceAddress {
                address: "Rohini, Delhi, India".to_string(),
                city: "Delhi".to_string(),
                state: "Delhi".to_string(),
                country: "India".to_string(),
            },
        );
        assert_eq!(info.label(), "Delhi, Delhi");
    }

    #[test]
    fn listing_status_serializes_lowercase() {
        let json = serde_json::to_string(&ListingStatus::Expired).unwrap();
        assert_eq!(json, "\"expired\"");
        assert_eq!(ListingStatus::Sold.to_string(), "sold");
    }
}
