//! Radius filtering and distance ranking of candidate listings.

use nearmart_core::{distance_km, Coordinates, Listing, NearbyListing};

/// Listings within `radius_km` of `origin`, nearest first.
///
/// The origin is required: callers resolve a fallback location before
/// filtering. Equal distances keep their input order.
#[must_use]
pub fn filter(origin: Coordinates, candidates: &[Listing], radius_km: f64) -> Vec<NearbyListing> {
    let mut nearby: Vec<NearbyListing> = candidates
        .iter()
        .map(|listing| NearbyListing {
            distance_km: distance_km(origin, listing.coordinates),
            listing: listing.clone(),
        })
        .filter(|item| item.distance_km <= radius_km)
        .collect();

    // `sort_by` is stable, so ties stay in input order.
    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    nearby
}
