//! A map surface that draws nothing and logs every operation.

use async_trait::async_trait;
use nearmart_core::{Coordinates, SELF_MARKER_ID};
use nearmart_discovery::{MapError, MapMarker, MapSurface};

#[derive(Debug, Default)]
pub(crate) struct LoggingMapSurface {
    pins: usize,
}

impl LoggingMapSurface {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MapSurface for LoggingMapSurface {
    async fn initialize(&mut self, center: Coordinates, zoom: u8) -> Result<(), MapError> {
        tracing::info!(lat = center.lat, lng = center.lng, zoom, "map: initialize");
        Ok(())
    }

    fn add_markers(&mut self, markers: &[MapMarker]) {
        for marker in markers {
            tracing::info!(
                id = %marker.id,
                title = %marker.title,
                price = %marker.price,
                lat = marker.coordinates.lat,
                lng = marker.coordinates.lng,
                "map: add marker"
            );
        }
        self.pins += markers.len();
    }

    fn remove_markers(&mut self, ids: &[String]) {
        for id in ids {
            tracing::info!(%id, "map: remove marker");
        }
        let listing_pins = ids.iter().filter(|id| id.as_str() != SELF_MARKER_ID).count();
        self.pins = self.pins.saturating_sub(listing_pins);
    }

    fn add_user_marker(&mut self, coordinates: Coordinates) {
        tracing::info!(lat = coordinates.lat, lng = coordinates.lng, "map: user marker");
    }

    fn center_on(&mut self, coordinates: Coordinates, zoom: u8) {
        tracing::info!(lat = coordinates.lat, lng = coordinates.lng, zoom, "map: center");
    }

    fn destroy(&mut self) {
        tracing::info!(pins = self.pins, "map: destroy");
        self.pins = 0;
    }
}
