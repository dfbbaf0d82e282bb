//! Location providers for running the engine outside a device.

use std::time::Duration;

use async_trait::async_trait;
use nearmart_core::Coordinates;
use nearmart_discovery::{LocationError, LocationProvider, PositionFix};

/// Always reports the same freshly captured position.
pub(crate) struct FixedLocationProvider {
    coordinates: Coordinates,
}

impl FixedLocationProvider {
    pub(crate) fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn current_position(
        &self,
        _timeout: Duration,
        _max_age: Duration,
    ) -> Result<PositionFix, LocationError> {
        Ok(PositionFix::now(self.coordinates))
    }
}

/// A host without any location capability.
pub(crate) struct UnsupportedProvider;

#[async_trait]
impl LocationProvider for UnsupportedProvider {
    async fn current_position(
        &self,
        _timeout: Duration,
        _max_age: Duration,
    ) -> Result<PositionFix, LocationError> {
        Err(LocationError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_provider_reports_its_position() {
        let provider = FixedLocationProvider::new(Coordinates::new(28.7, 77.1));
        let fix = provider
            .current_position(Duration::from_secs(1), Duration::ZERO)
            .await
            .expect("fixed provider never fails");
        assert_eq!(fix.coordinates, Coordinates::new(28.7, 77.1));
    }

    #[tokio::test]
    async fn unsupported_provider_reports_unsupported() {
        let err = UnsupportedProvider
            .current_position(Duration::from_secs(1), Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err, LocationError::Unsupported);
    }
}
