//! Movement threshold for deciding when the nearby set is worth recomputing.

use nearmart_core::{distance_km, LocationInfo};

pub const DEFAULT_MOVEMENT_THRESHOLD_KM: f64 = 0.5;

/// `true` on the first observation or when the user moved strictly further
/// than `threshold_km` since `previous`.
#[must_use]
pub fn should_refresh(
    previous: Option<&LocationInfo>,
    current: &LocationInfo,
    threshold_km: f64,
) -> bool {
    match previous {
        None => true,
        Some(previous) => distance_km(previous.coordinates, current.coordinates) > threshold_km,
    }
}

#[cfg(test)]
mod tests {
    use nearmart_core::Coordinates;

    use super::*;

    fn at(lat: f64, lng: f64) -> LocationInfo {
        LocationInfo::coordinate_only(Coordinates::new(lat, lng))
    }

    #[test]
    fn first_observation_always_refreshes() {
        assert!(should_refresh(None, &at(28.70, 77.10), DEFAULT_MOVEMENT_THRESHOLD_KM));
        assert!(should_refresh(None, &at(0.0, 0.0), 1000.0));
    }

    #[test]
    fn zero_movement_never_refreshes() {
        let loc = at(28.70, 77.10);
        assert!(!should_refresh(Some(&loc), &loc, DEFAULT_MOVEMENT_THRESHOLD_KM));
        assert!(!should_refresh(Some(&loc), &loc, 0.0));
    }

    #[test]
    fn jitter_below_threshold_is_ignored() {
        // ~0.2 km north
        let before = at(28.700, 77.10);
        let after = at(28.702, 77.10);
        assert!(!should_refresh(Some(&before), &after, DEFAULT_MOVEMENT_THRESHOLD_KM));
    }

    #[test]
    fn movement_beyond_threshold_refreshes() {
        // ~1.1 km north
        let before = at(28.70, 77.10);
        let after = at(28.71, 77.10);
        assert!(should_refresh(Some(&before), &after, DEFAULT_MOVEMENT_THRESHOLD_KM));
    }

    #[test]
    fn threshold_is_exclusive() {
        // Rounded distance is exactly 0.4 km.
        let before = at(28.70, 77.10);
        let after = at(28.703, 77.102);
        assert!(!should_refresh(Some(&before), &after, 0.4));
        assert!(should_refresh(Some(&before), &after, 0.3));
    }
}
