//! One-shot commands that read the listings file directly.

use anyhow::{ensure, Context};
use nearmart_core::{distance_km, format_distance, Coordinates, EngineConfig, NearbyListing};
use nearmart_discovery::nearby;

pub(crate) fn run_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) {
    let from = Coordinates::new(lat1, lng1);
    let to = Coordinates::new(lat2, lng2);
    println!("{}", describe_distance(from, to));
}

/// Raw great-circle km followed by the display form, e.g. `"0.4 km (400m)"`.
pub(crate) fn describe_distance(from: Coordinates, to: Coordinates) -> String {
    let km = distance_km(from, to);
    format!("{km} km ({})", format_distance(km))
}

/// Print active listings within `radius_km` of a point, nearest first.
///
/// # Errors
///
/// Returns an error if the coordinates are out of range or the listings
/// file cannot be loaded.
pub(crate) fn run_nearby(
    config: &EngineConfig,
    lat: f64,
    lng: f64,
    radius_km: Option<f64>,
) -> anyhow::Result<()> {
    let origin = Coordinates::new(lat, lng);
    ensure!(origin.is_valid(), "coordinates out of range: {lat}, {lng}");
    let radius_km = radius_km.unwrap_or(config.radius_km);
    ensure!(
        radius_km.is_finite() && radius_km >= 0.0,
        "radius must be a non-negative number of km"
    );

    let file = nearmart_core::load_listings(&config.listings_path).with_context(|| {
        format!(
            "loading listings from {}",
            config.listings_path.display()
        )
    })?;
    let results = nearby::filter(origin, &file.active_listings(), radius_km);

    if results.is_empty() {
        println!("no active listings within {radius_km} km of {origin}");
        return Ok(());
    }
    print_nearby(&results);
    Ok(())
}

pub(crate) fn print_nearby(results: &[NearbyListing]) {
    println!("{:<10}{:<14}{:>10}  NAME", "DISTANCE", "ID", "PRICE");
    for item in results {
        let listing = &item.listing;
        let name = if listing.name.chars().count() > 40 {
            format!("{}...", listing.name.chars().take(40).collect::<String>())
        } else {
            listing.name.clone()
        };
        println!(
            "{:<10}{:<14}{:>10}  {}",
            item.formatted_distance(),
            listing.id,
            listing.price,
            name
        );
    }
}
