//! The discovery cycle: location -> movement gate -> listings -> nearby set
//! -> map markers.
//!
//! [`DiscoveryLoop`] exclusively owns the previous location, the nearby set
//! and the attached map surface. Nothing else writes them; the presentation
//! layer observes the nearby set and the selection through `watch`
//! channels.

use std::sync::Arc;
use std::time::Duration;

use nearmart_core::{EngineConfig, LocationInfo, NearbyListing};
use tokio::sync::watch;

use crate::error::MapError;
use crate::gate;
use crate::markers::{markers_for, ActivationToken, MarkerReconciler};
use crate::nearby;
use crate::ports::{ListingsStore, MapSurface};
use crate::tracker::LocationTracker;

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub radius_km: f64,
    pub movement_threshold_km: f64,
    pub tick_interval: Duration,
    /// `None` disables automatic location re-polling.
    pub location_repoll: Option<Duration>,
    pub zoom: u8,
}

impl LoopSettings {
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            radius_km: config.radius_km,
            movement_threshold_km: config.movement_threshold_km,
            tick_interval: config.tick_interval(),
            location_repoll: config.location_repoll(),
            zoom: config.map_zoom,
        }
    }
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No location has been published yet.
    Skipped,
    /// Movement stayed under the threshold.
    Unchanged,
    /// Listings were refetched and the nearby set recomputed.
    Refreshed { nearby: usize, markers_synced: bool },
    /// The listings fetch failed; the previous nearby set was kept.
    FetchFailed,
}

pub struct DiscoveryLoop {
    tracker: Arc<LocationTracker>,
    store: Arc<dyn ListingsStore>,
    settings: LoopSettings,
    map: Option<Box<dyn MapSurface>>,
    map_ready: bool,
    reconciler: MarkerReconciler,
    previous_location: Option<LocationInfo>,
    nearby: watch::Sender<Vec<NearbyListing>>,
    selected: watch::Sender<Option<NearbyListing>>,
}

impl DiscoveryLoop {
    #[must_use]
    pub fn new(
        tracker: Arc<LocationTracker>,
        store: Arc<dyn ListingsStore>,
        settings: LoopSettings,
    ) -> Self {
        let (nearby, _) = watch::channel(Vec::new());
        let (selected, _) = watch::channel(None);
        Self {
            tracker,
            store,
            settings,
            map: None,
            map_ready: false,
            reconciler: MarkerReconciler::new(),
            previous_location: None,
            nearby,
            selected,
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<LocationTracker> {
        &self.tracker
    }

    #[must_use]
    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    #[must_use]
    pub fn nearby(&self) -> Vec<NearbyListing> {
        self.nearby.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_nearby(&self) -> watch::Receiver<Vec<NearbyListing>> {
        self.nearby.subscribe()
    }

    #[must_use]
    pub fn subscribe_selection(&self) -> watch::Receiver<Option<NearbyListing>> {
        self.selected.subscribe()
    }

    #[must_use]
    pub fn selected(&self) -> Option<NearbyListing> {
        self.selected.borrow().clone()
    }

    #[must_use]
    pub fn is_map_ready(&self) -> bool {
        self.map_ready
    }

    #[must_use]
    pub fn previous_location(&self) -> Option<&LocationInfo> {
        self.previous_location.as_ref()
    }

    #[must_use]
    pub fn reconciler(&self) -> &MarkerReconciler {
        &self.reconciler
    }

    /// Initialize `surface` centred on the current (or fallback) location and
    /// draw the current state onto it.
    ///
    /// On failure the surface is destroyed and the map stays not-ready until
    /// the caller attaches a surface again; location tracking and listing
    /// refreshes keep running either way.
    ///
    /// # Errors
    ///
    /// Returns the surface's [`MapError`] if initialization fails.
    pub async fn attach_map(&mut self, mut surface: Box<dyn MapSurface>) -> Result<(), MapError> {
        self.detach_map();

        let location = self.tracker.current_location();
        let center = location
            .as_ref()
            .map_or(self.tracker.fallback().coordinates, |l| l.coordinates);

        if let Err(err) = surface.initialize(center, self.settings.zoom).await {
            tracing::error!(error = %err, "map initialization failed; markers disabled for this session");
            surface.destroy();
            return Err(err);
        }

        if let Some(location) = &location {
            self.reconciler
                .place_user_marker(location.coordinates, surface.as_mut());
        }
        let markers = markers_for(&self.nearby.borrow());
        self.reconciler.sync(&markers, surface.as_mut());

        self.map = Some(surface);
        self.map_ready = true;
        tracing::info!(lat = center.lat, lng = center.lng, "map surface attached");
        Ok(())
    }

    /// Destroy the attached surface, if any, and forget what it rendered.
    pub fn detach_map(&mut self) {
        if let Some(mut surface) = self.map.take() {
            surface.destroy();
            tracing::debug!("map surface destroyed");
        }
        self.map_ready = false;
        self.reconciler.clear();
    }

    /// Run one discovery cycle to completion.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let Some(current) = self.tracker.current_location() else {
            tracing::debug!("no location yet; skipping cycle");
            return CycleOutcome::Skipped;
        };

        self.place_user_marker(&current);

        if !gate::should_refresh(
            self.previous_location.as_ref(),
            &current,
            self.settings.movement_threshold_km,
        ) {
            self.previous_location = Some(current);
            return CycleOutcome::Unchanged;
        }

        let candidates = match self.store.get_active_listings().await {
            Ok(listings) => listings,
            Err(err) => {
                // Keep the last good nearby set, and leave the previous
                // location alone so the next tick retries the fetch.
                tracing::warn!(error = %err, "listings fetch failed; keeping previous nearby set");
                return CycleOutcome::FetchFailed;
            }
        };

        let nearby = nearby::filter(current.coordinates, &candidates, self.settings.radius_km);
        let count = nearby.len();
        tracing::info!(
            candidates = candidates.len(),
            nearby = count,
            radius_km = self.settings.radius_km,
            "nearby listings recomputed"
        );
        self.publish_nearby(nearby);
        let markers_synced = self.sync_markers();

        self.previous_location = Some(current);
        CycleOutcome::Refreshed {
            nearby: count,
            markers_synced,
        }
    }

    /// Re-resolve the location, then recenter the map on it.
    pub async fn refresh_location(&mut self) {
        self.tracker.refresh_location().await;
        let Some(location) = self.tracker.current_location() else {
            return;
        };
        let zoom = self.settings.zoom;
        if let Some(surface) = self.ready_surface() {
            surface.center_on(location.coordinates, zoom);
        }
        self.place_user_marker(&location);
    }

    /// Recenter the map on the current location without re-resolving it.
    pub fn center_on_user(&mut self, zoom: u8) {
        let Some(location) = self.tracker.current_location() else {
            return;
        };
        if let Some(surface) = self.ready_surface() {
            surface.center_on(location.coordinates, zoom);
        }
    }

    /// Resolve a marker's activation token to the listing it stands for and
    /// make it the current selection.
    pub fn activate(&mut self, token: &ActivationToken) -> Option<NearbyListing> {
        let found = self
            .nearby
            .borrow()
            .iter()
            .find(|item| item.listing.id == token.listing_id())
            .cloned();
        match &found {
            Some(item) => {
                tracing::debug!(listing_id = %item.listing.id, "listing selected");
                self.selected.send_replace(Some(item.clone()));
            }
            None => {
                tracing::debug!(
                    listing_id = token.listing_id(),
                    "activation for a listing that is no longer nearby"
                );
            }
        }
        found
    }

    pub fn clear_selection(&mut self) {
        self.selected.send_replace(None);
    }

    /// Release the map surface. Safe to call more than once.
    pub fn teardown(&mut self) {
        self.detach_map();
    }

    fn publish_nearby(&mut self, nearby: Vec<NearbyListing>) {
        let selection_gone = self.selected.borrow().as_ref().is_some_and(|selected| {
            !nearby
                .iter()
                .any(|item| item.listing.id == selected.listing.id)
        });
        if selection_gone {
            self.selected.send_replace(None);
        }
        self.nearby.send_replace(nearby);
    }

    fn sync_markers(&mut self) -> bool {
        if !self.map_ready {
            return false;
        }
        let markers = markers_for(&self.nearby.borrow());
        let Some(surface) = self.map.as_deref_mut() else {
            return false;
        };
        self.reconciler.sync(&markers, surface);
        true
    }

    /// No-op while the map is not ready or the marker is already there.
    fn place_user_marker(&mut self, location: &LocationInfo) {
        if !self.map_ready || self.reconciler.user_marker() == Some(location.coordinates) {
            return;
        }
        if let Some(surface) = self.map.as_deref_mut() {
            self.reconciler
                .place_user_marker(location.coordinates, surface);
        }
    }

    fn ready_surface(&mut self) -> Option<&mut (dyn MapSurface + 'static)> {
        if self.map_ready {
            self.map.as_deref_mut()
        } else {
            None
        }
    }
}

impl Drop for DiscoveryLoop {
    fn drop(&mut self) {
        self.teardown();
    }
}
