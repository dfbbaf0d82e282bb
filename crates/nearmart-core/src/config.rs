use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use crate::app_config::EngineConfig;
use crate::{ConfigError, Coordinates, LocationInfo};

/// Load engine configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a variable holds an unparseable or out-of-range value.
pub fn load_engine_config() -> Result<EngineConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_engine_config_from_env()
}

/// Load engine configuration from environment variables already in the process.
///
/// Unlike [`load_engine_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a variable holds an unparseable or out-of-range value.
pub fn load_engine_config_from_env() -> Result<EngineConfig, ConfigError> {
    build_engine_config(|key| std::env::var(key))
}

/// Build engine configuration using the provided env-var lookup function.
///
/// Every variable has a default, so an empty environment yields a working
/// configuration centred on the built-in fallback region.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for unparseable values and
/// `ConfigError::Validation` for values that parse but make no sense
/// (negative radius, zero tick interval, fallback outside WGS84).
pub fn build_engine_config<F>(lookup: F) -> Result<EngineConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default =
        |var: &str, default: &str| -> String { lookup(var).unwrap_or_else(|_| default.to_string()) };

    let log_level = or_default("NEARMART_LOG_LEVEL", "info");
    let radius_km = parse_var(&lookup, "NEARMART_RADIUS_KM", "10")?;
    let movement_threshold_km = parse_var(&lookup, "NEARMART_MOVEMENT_THRESHOLD_KM", "0.5")?;
    let tick_interval_ms = parse_var(&lookup, "NEARMART_TICK_INTERVAL_MS", "2000")?;
    let location_repoll_secs = parse_var(&lookup, "NEARMART_LOCATION_REPOLL_SECS", "0")?;
    let location_timeout_ms = parse_var(&lookup, "NEARMART_LOCATION_TIMEOUT_MS", "10000")?;
    let location_max_age_ms = parse_var(&lookup, "NEARMART_LOCATION_MAX_AGE_MS", "300000")?;

    let default_coordinates = Coordinates::new(
        parse_var(&lookup, "NEARMART_DEFAULT_LAT", "28.7041")?,
        parse_var(&lookup, "NEARMART_DEFAULT_LNG", "77.1025")?,
    );
    let default_location = LocationInfo {
        coordinates: default_coordinates,
        address: or_default("NEARMART_DEFAULT_ADDRESS", "Delhi, India"),
        city: or_default("NEARMART_DEFAULT_CITY", "Delhi"),
        state: or_default("NEARMART_DEFAULT_STATE", "Delhi"),
        country: or_default("NEARMART_DEFAULT_COUNTRY", "India"),
    };

    let map_zoom = parse_var(&lookup, "NEARMART_MAP_ZOOM", "14")?;
    let geocoder_url = or_default(
        "NEARMART_GEOCODER_URL",
        "https://nominatim.openstreetmap.org/",
    );
    let geocoder_timeout_secs = parse_var(&lookup, "NEARMART_GEOCODER_TIMEOUT_SECS", "10")?;
    let geocoder_user_agent = or_default(
        "NEARMART_GEOCODER_USER_AGENT",
        "nearmart/0.1 (local-marketplace)",
    );
    let geocoder_max_retries = parse_var(&lookup, "NEARMART_GEOCODER_MAX_RETRIES", "2")?;
    let listings_path = PathBuf::from(or_default(
        "NEARMART_LISTINGS_PATH",
        "./config/listings.yaml",
    ));

    let config = EngineConfig {
        log_level,
        radius_km,
        movement_threshold_km,
        tick_interval_ms,
        location_repoll_secs,
        location_timeout_ms,
        location_max_age_ms,
        default_location,
        map_zoom,
        geocoder_url,
        geocoder_timeout_secs,
        geocoder_user_agent,
        geocoder_max_retries,
        listings_path,
    };
    validate(&config)?;
    Ok(config)
}

/// Parse `var` (or `default` when unset) as `T`.
fn parse_var<T, F>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
    if !config.radius_km.is_finite() || config.radius_km < 0.0 {
        return Err(ConfigError::Validation(format!(
            "radius must be a non-negative number of km, got {}",
            config.radius_km
        )));
    }
    if !config.movement_threshold_km.is_finite() || config.movement_threshold_km < 0.0 {
        return Err(ConfigError::Validation(format!(
            "movement threshold must be a non-negative number of km, got {}",
            config.movement_threshold_km
        )));
    }
    if config.tick_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "tick interval must be greater than zero".to_string(),
        ));
    }
    if config.location_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "location timeout must be greater than zero".to_string(),
        ));
    }
    if !config.default_location.coordinates.is_valid() {
        return Err(ConfigError::Validation(format!(
            "default location ({}, {}) is outside the WGS84 range",
            config.default_location.coordinates.lat, config.default_location.coordinates.lng
        )));
    }
    Ok(())
}
