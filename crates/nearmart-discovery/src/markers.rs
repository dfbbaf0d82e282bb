//! Map marker derivation and id-based reconciliation.
//!
//! The reconciler owns the set of marker ids it believes are on the map
//! surface. It never asks the surface what is rendered; every mutation of
//! the surface goes through a [`MarkerDiff`] so that belief and reality
//! cannot drift apart.
//!
//! Identity is the marker id alone. A listing whose price or title changed
//! but whose id did not is left untouched; callers that need fresh payloads
//! must remove and re-add it.

use std::collections::{BTreeSet, HashSet};

use nearmart_core::{Coordinates, NearbyListing, SELF_MARKER_ID};
use rust_decimal::Decimal;

use crate::ports::MapSurface;

/// Opaque handle carried by a listing marker. Resolved by the discovery
/// loop into the listing the user selected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivationToken(String);

impl ActivationToken {
    #[must_use]
    pub fn new(listing_id: impl Into<String>) -> Self {
        Self(listing_id.into())
    }

    #[must_use]
    pub fn listing_id(&self) -> &str {
        &self.0
    }
}

/// A renderable pin.
#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub id: String,
    pub coordinates: Coordinates,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    /// `None` only for the user's own marker.
    pub activation: Option<ActivationToken>,
}

impl MapMarker {
    #[must_use]
    pub fn for_listing(nearby: &NearbyListing) -> Self {
        let listing = &nearby.listing;
        Self {
            id: listing.id.clone(),
            coordinates: listing.coordinates,
            title: listing.name.clone(),
            description: listing.description.clone(),
            price: listing.price,
            activation: Some(ActivationToken::new(listing.id.clone())),
        }
    }
}

/// One marker per nearby listing, in nearby order.
///
/// Listings that collide with the reserved self-marker id are dropped.
#[must_use]
pub fn markers_for(nearby: &[NearbyListing]) -> Vec<MapMarker> {
    nearby
        .iter()
        .filter(|item| {
            let reserved = item.listing.id == SELF_MARKER_ID;
            if reserved {
                tracing::warn!(
                    listing_id = %item.listing.id,
                    "listing uses the reserved user-marker id; not rendering it"
                );
            }
            !reserved
        })
        .map(MapMarker::for_listing)
        .collect()
}

/// Operations needed to bring the rendered set in line with the desired set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerDiff {
    pub to_add: Vec<MapMarker>,
    pub to_remove: Vec<String>,
}

impl MarkerDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Diff `desired` against the ids currently rendered.
///
/// Additions keep the order of `desired` (first occurrence wins when an id
/// repeats); removals are sorted by id.
#[must_use]
pub fn reconcile(desired: &[MapMarker], rendered: &BTreeSet<String>) -> MarkerDiff {
    let mut wanted: HashSet<&str> = HashSet::with_capacity(desired.len());
    let mut to_add = Vec::new();

    for marker in desired {
        if !wanted.insert(marker.id.as_str()) {
            continue;
        }
        if !rendered.contains(&marker.id) {
            to_add.push(marker.clone());
        }
    }

    let to_remove = rendered
        .iter()
        .filter(|id| !wanted.contains(id.as_str()))
        .cloned()
        .collect();

    MarkerDiff { to_add, to_remove }
}

/// Owner of the rendered listing-marker ids and the single user marker.
#[derive(Debug, Default)]
pub struct MarkerReconciler {
    rendered: BTreeSet<String>,
    user_marker: Option<Coordinates>,
}

impl MarkerReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rendered_ids(&self) -> &BTreeSet<String> {
        &self.rendered
    }

    #[must_use]
    pub fn user_marker(&self) -> Option<Coordinates> {
        self.user_marker
    }

    #[must_use]
    pub fn plan(&self, desired: &[MapMarker]) -> MarkerDiff {
        reconcile(desired, &self.rendered)
    }

    /// Record that `diff` has been applied to the surface.
    pub fn commit(&mut self, diff: &MarkerDiff) {
        for id in &diff.to_remove {
            self.rendered.remove(id);
        }
        for marker in &diff.to_add {
            self.rendered.insert(marker.id.clone());
        }
    }

    /// Plan, apply and commit in one step. Returns the applied diff.
    pub fn sync(&mut self, desired: &[MapMarker], surface: &mut dyn MapSurface) -> MarkerDiff {
        let diff = self.plan(desired);
        if !diff.to_remove.is_empty() {
            surface.remove_markers(&diff.to_remove);
        }
        if !diff.to_add.is_empty() {
            surface.add_markers(&diff.to_add);
        }
        self.commit(&diff);
        tracing::debug!(
            added = diff.to_add.len(),
            removed = diff.to_remove.len(),
            rendered = self.rendered.len(),
            "reconciled map markers"
        );
        diff
    }

    /// Replace the user marker with one at `coordinates`.
    pub fn place_user_marker(&mut self, coordinates: Coordinates, surface: &mut dyn MapSurface) {
        if self.user_marker.is_some() {
            surface.remove_markers(&[SELF_MARKER_ID.to_string()]);
        }
        surface.add_user_marker(coordinates);
        self.user_marker = Some(coordinates);
    }

    /// Forget everything; used when the surface is destroyed.
    pub fn clear(&mut self) {
        self.rendered.clear();
        self.user_marker = None;
    }
}
