use thiserror::Error;

/// Boxed error carried across collaborator boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why the tracker could not produce a real, fully resolved location.
///
/// Every variant is recoverable: the tracker publishes it as a status and
/// keeps a usable location (the configured default, or a coordinate-only
/// location for [`LocationError::GeocodingFailed`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location access denied. Please enable location permissions.")]
    PermissionDenied,

    #[error("Location information unavailable.")]
    PositionUnavailable,

    #[error("Location request timeout.")]
    Timeout,

    #[error("Address lookup failed: {0}")]
    GeocodingFailed(String),

    #[error("Geolocation is not supported by this platform")]
    Unsupported,
}

/// Failure fetching listings from the external store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("listings store transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("listings store unavailable: {0}")]
    Unavailable(String),
}

/// Failure talking to the map rendering surface.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("map initialization failed: {0}")]
    Initialization(String),

    #[error("no map surface attached")]
    NotAttached,
}
