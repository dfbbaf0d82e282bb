//! Great-circle distance and distance formatting.
//!
//! All engine distances go through [`distance_km`], which rounds to one
//! decimal place so that the same pair of coordinates always yields the
//! same comparable value across filtering, movement detection and display.

use crate::Coordinates;

/// Mean Earth radius used by the Haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between `a` and `b` in kilometres, rounded to one
/// decimal place.
#[must_use]
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    round_to_tenth(EARTH_RADIUS_KM * c)
}

fn round_to_tenth(km: f64) -> f64 {
    (km * 10.0).round() / 10.0
}

/// Render a distance for display.
///
/// Under 1 km the value is shown in whole metres (`"450m"`), under 10 km
/// with one decimal (`"3.3km"`), and beyond that in whole kilometres
/// (`"15km"`). Negative or NaN input is treated as zero.
#[must_use]
pub fn format_distance(km: f64) -> String {
    let km = if km.is_nan() { 0.0 } else { km.max(0.0) };
    if km < 1.0 {
        format!("{:.0}m", (km * 1000.0).round())
    } else if km < 10.0 {
        format!("{km:.1}km")
    } else {
        format!("{:.0}km", km.round())
    }
}
