//! Collaborator interfaces consumed by the engine.
//!
//! The engine never talks to a platform API, HTTP service or rendering
//! backend directly. Adapters implement these traits; tests implement them
//! with in-memory fakes.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nearmart_core::{Coordinates, Listing, PlaceAddress};

use crate::error::{BoxError, LocationError, MapError, StoreError};
use crate::markers::MapMarker;

/// A single coordinate reading from the location provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    pub coordinates: Coordinates,
    /// When the platform captured the reading. Cached fixes may be older
    /// than the request.
    pub captured_at: DateTime<Utc>,
}

impl PositionFix {
    #[must_use]
    pub fn now(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            captured_at: Utc::now(),
        }
    }
}

/// Platform location capability (GPS, OS location service, browser API).
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Acquire a fix, waiting at most `timeout` and accepting a cached
    /// reading no older than `max_age`.
    async fn current_position(
        &self,
        timeout: Duration,
        max_age: Duration,
    ) -> Result<PositionFix, LocationError>;
}

/// Converts coordinates into a human-readable place.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse_geocode(&self, coordinates: Coordinates) -> Result<PlaceAddress, BoxError>;
}

/// Source of candidate listings. Read-only from the engine's perspective.
#[async_trait]
pub trait ListingsStore: Send + Sync {
    async fn get_active_listings(&self) -> Result<Vec<Listing>, StoreError>;
}

/// The rendering surface that draws the map and its pins.
///
/// Only [`MapSurface::initialize`] can suspend. Marker operations are
/// fire-and-forget; the engine keeps its own record of what is rendered and
/// never reads rendering state back.
#[async_trait]
pub trait MapSurface: Send {
    async fn initialize(&mut self, center: Coordinates, zoom: u8) -> Result<(), MapError>;

    fn add_markers(&mut self, markers: &[MapMarker]);

    fn remove_markers(&mut self, ids: &[String]);

    fn add_user_marker(&mut self, coordinates: Coordinates);

    fn center_on(&mut self, coordinates: Coordinates, zoom: u8);

    fn destroy(&mut self);
}
