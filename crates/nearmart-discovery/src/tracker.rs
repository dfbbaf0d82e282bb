//! Owner of the user's current location.
//!
//! The tracker moves through `Idle -> Resolving -> {Resolved | Failed}` and
//! re-enters `Resolving` on every refresh. State is published through a
//! [`tokio::sync::watch`] channel: each resolution replaces the whole
//! [`TrackerSnapshot`], so when refreshes overlap the last one to complete
//! wins and no half-updated location is ever observable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nearmart_core::{Coordinates, EngineConfig, LocationInfo};
use tokio::sync::watch;

use crate::error::LocationError;
use crate::ports::{LocationProvider, ReverseGeocoder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Resolving,
    Resolved,
    Failed(LocationError),
}

/// Everything the presentation layer needs to render location status.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    pub state: TrackerState,
    /// Real, coordinate-only, or default location. `None` only before the
    /// first resolution completes.
    pub location: Option<LocationInfo>,
    /// Non-fatal status to show the user.
    pub error: Option<LocationError>,
    pub is_loading: bool,
}

impl TrackerSnapshot {
    fn idle() -> Self {
        Self {
            state: TrackerState::Idle,
            location: None,
            error: None,
            is_loading: false,
        }
    }

    /// Header text: `"City, State"`, or a loading/unavailable placeholder.
    #[must_use]
    pub fn display_label(&self) -> String {
        match &self.location {
            Some(location) => location.label(),
            None if self.is_loading => "Getting location...".to_string(),
            None => "Location unavailable".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub timeout: Duration,
    pub max_age: Duration,
    /// Published whenever no real fix can be obtained.
    pub fallback: LocationInfo,
}

impl TrackerSettings {
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            timeout: config.location_timeout(),
            max_age: config.location_max_age(),
            fallback: config.default_location.clone(),
        }
    }
}

pub struct LocationTracker {
    provider: Arc<dyn LocationProvider>,
    geocoder: Arc<dyn ReverseGeocoder>,
    settings: TrackerSettings,
    state: watch::Sender<TrackerSnapshot>,
    in_flight: AtomicUsize,
}

/// One outstanding location request.
///
/// Dropping it without [`InFlight::finish`] (the request future was
/// cancelled) releases the in-flight count and, when no other request is
/// running, puts back the state and status that were showing before it
/// entered `Resolving`.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
    state: &'a watch::Sender<TrackerSnapshot>,
    before: Option<(TrackerState, Option<LocationError>)>,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, state: &'a watch::Sender<TrackerSnapshot>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        let mut before = None;
        state.send_modify(|snapshot| {
            before = Some((snapshot.state.clone(), snapshot.error.take()));
            snapshot.state = TrackerState::Resolving;
            snapshot.is_loading = true;
        });
        Self {
            counter,
            state,
            before,
        }
    }

    /// Release this request; `true` while other requests are still running.
    fn finish(mut self) -> bool {
        self.before = None;
        self.counter.fetch_sub(1, Ordering::SeqCst) > 1
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let Some((state, error)) = self.before.take() else {
            return;
        };
        let others = self.counter.fetch_sub(1, Ordering::SeqCst) > 1;
        tracing::debug!(others, "location request cancelled");
        if others {
            return;
        }
        self.state.send_modify(|snapshot| {
            snapshot.is_loading = false;
            if snapshot.state == TrackerState::Resolving {
                snapshot.state = state;
                snapshot.error = error;
            }
        });
    }
}

impl LocationTracker {
    #[must_use]
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        geocoder: Arc<dyn ReverseGeocoder>,
        settings: TrackerSettings,
    ) -> Self {
        let (state, _) = watch::channel(TrackerSnapshot::idle());
        Self {
            provider,
            geocoder,
            settings,
            state,
            in_flight: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> TrackerSnapshot {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn current_location(&self) -> Option<LocationInfo> {
        self.state.borrow().location.clone()
    }

    #[must_use]
    pub fn fallback(&self) -> &LocationInfo {
        &self.settings.fallback
    }

    /// Acquire a fix, reverse-geocode it and publish the result.
    ///
    /// Never fails: provider errors publish `Failed(..)` together with the
    /// fallback location, geocoding errors publish a coordinate-only
    /// location with a [`LocationError::GeocodingFailed`] status.
    pub async fn get_current_location(&self) {
        let request = InFlight::enter(&self.in_flight, &self.state);

        let outcome = match self.acquire_fix().await {
            Ok(coordinates) => Ok(self.resolve_place(coordinates).await),
            Err(err) => Err(err),
        };

        let still_loading = request.finish();
        match outcome {
            Ok((location, geocode_error)) => {
                tracing::info!(
                    lat = location.coordinates.lat,
                    lng = location.coordinates.lng,
                    city = %location.city,
                    "location resolved"
                );
                self.state.send_replace(TrackerSnapshot {
                    state: TrackerState::Resolved,
                    location: Some(location),
                    error: geocode_error,
                    is_loading: still_loading,
                });
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    fallback = %self.settings.fallback.address,
                    "location unavailable; using default location"
                );
                self.state.send_replace(TrackerSnapshot {
                    state: TrackerState::Failed(err.clone()),
                    location: Some(self.settings.fallback.clone()),
                    error: Some(err),
                    is_loading: still_loading,
                });
            }
        }
    }

    /// Re-run [`LocationTracker::get_current_location`].
    pub async fn refresh_location(&self) {
        self.get_current_location().await;
    }

    async fn acquire_fix(&self) -> Result<Coordinates, LocationError> {
        let request = self
            .provider
            .current_position(self.settings.timeout, self.settings.max_age);
        // Bound the wait even if the provider ignores its own timeout.
        let fix = tokio::time::timeout(self.settings.timeout, request)
            .await
            .map_err(|_| LocationError::Timeout)??;

        let age = Utc::now().signed_duration_since(fix.captured_at);
        let max_age = chrono::Duration::from_std(self.settings.max_age)
            .unwrap_or(chrono::Duration::MAX);
        if age > max_age {
            tracing::warn!(
                age_secs = age.num_seconds(),
                "provider returned a fix older than the accepted maximum age"
            );
            return Err(LocationError::PositionUnavailable);
        }

        if !fix.coordinates.is_valid() {
            tracing::warn!(
                lat = fix.coordinates.lat,
                lng = fix.coordinates.lng,
                "provider returned coordinates outside the WGS84 range"
            );
            return Err(LocationError::PositionUnavailable);
        }

        Ok(fix.coordinates)
    }

    async fn resolve_place(
        &self,
        coordinates: Coordinates,
    ) -> (LocationInfo, Option<LocationError>) {
        match self.geocoder.reverse_geocode(coordinates).await {
            Ok(place) => (LocationInfo::from_place(coordinates, place), None),
            Err(err) => {
                tracing::warn!(error = %err, "reverse geocoding failed; using coordinates as address");
                (
                    LocationInfo::coordinate_only(coordinates),
                    Some(LocationError::GeocodingFailed(err.to_string())),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use nearmart_core::PlaceAddress;

    use super::*;
    use crate::error::BoxError;
    use crate::ports::PositionFix;

    const HERE: Coordinates = Coordinates::new(28.61, 77.21);

    fn settings() -> TrackerSettings {
        TrackerSettings {
            timeout: Duration::from_secs(10),
            max_age: Duration::from_secs(300),
            fallback: LocationInfo {
                coordinates: Coordinates::new(28.7041, 77.1025),
                address: "Delhi, India".to_string(),
                city: "Delhi".to_string(),
                state: "Delhi".to_string(),
                country: "India".to_string(),
            },
        }
    }

    /// Provider that replays queued results; `None` hangs forever.
    struct ScriptedProvider {
        results: Mutex<Vec<Option<Result<PositionFix, LocationError>>>>,
    }

    impl ScriptedProvider {
        fn new(mut results: Vec<Option<Result<PositionFix, LocationError>>>) -> Arc<Self> {
            results.reverse();
            Arc::new(Self {
                results: Mutex::new(results),
            })
        }
    }

    #[async_trait]
    impl LocationProvider for ScriptedProvider {
        async fn current_position(
            &self,
            _timeout: Duration,
            _max_age: Duration,
        ) -> Result<PositionFix, LocationError> {
            let next = self.results.lock().unwrap().pop().flatten();
            match next {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }
    }

    struct FixedGeocoder {
        fail: bool,
    }

    #[async_trait]
    impl ReverseGeocoder for FixedGeocoder {
        async fn reverse_geocode(&self, _coordinates: Coordinates) -> Result<PlaceAddress, BoxError> {
            if self.fail {
                return Err("nominatim returned 503".into());
            }
            Ok(PlaceAddress {
                address: "Connaught Place, New Delhi, Delhi".to_string(),
                city: "New Delhi".to_string(),
                state: "Delhi".to_string(),
                country: "India".to_string(),
            })
        }
    }

    fn tracker(
        results: Vec<Option<Result<PositionFix, LocationError>>>,
        geocoder_fails: bool,
    ) -> LocationTracker {
        LocationTracker::new(
            ScriptedProvider::new(results),
            Arc::new(FixedGeocoder {
                fail: geocoder_fails,
            }),
            settings(),
        )
    }

    #[test]
    fn starts_idle_without_location() {
        let tracker = tracker(vec![], false);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackerState::Idle);
        assert!(tracker.current_location().is_none());
        assert_eq!(snapshot.display_label(), "Location unavailable");
    }

    #[tokio::test]
    async fn successful_fix_is_geocoded_and_published() {
        let tracker = tracker(vec![Some(Ok(PositionFix::now(HERE)))], false);
        tracker.get_current_location().await;

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackerState::Resolved);
        assert!(snapshot.error.is_none());
        assert!(!snapshot.is_loading);
        let location = snapshot.location.unwrap();
        assert_eq!(location.coordinates, HERE);
        assert_eq!(location.city, "New Delhi");
        assert_eq!(snapshot_label(&tracker), "New Delhi, Delhi");
    }

    fn snapshot_label(tracker: &LocationTracker) -> String {
        tracker.snapshot().display_label()
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back_to_default_location() {
        let tracker = tracker(vec![None], false);
        tracker.get_current_location().await;

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackerState::Failed(LocationError::Timeout));
        assert_eq!(snapshot.error, Some(LocationError::Timeout));
        assert_eq!(tracker.current_location(), Some(settings().fallback));
    }

    #[tokio::test]
    async fn permission_denied_falls_back_with_status_message() {
        let tracker = tracker(vec![Some(Err(LocationError::PermissionDenied))], false);
        tracker.get_current_location().await;

        let snapshot = tracker.snapshot();
        assert_eq!(
            snapshot.state,
            TrackerState::Failed(LocationError::PermissionDenied)
        );
        assert_eq!(
            snapshot.error.map(|e| e.to_string()).as_deref(),
            Some("Location access denied. Please enable location permissions.")
        );
        assert_eq!(snapshot.location.unwrap().city, "Delhi");
    }

    #[tokio::test]
    async fn unsupported_platform_falls_back() {
        let tracker = tracker(vec![Some(Err(LocationError::Unsupported))], false);
        tracker.get_current_location().await;
        assert_eq!(
            tracker.snapshot().state,
            TrackerState::Failed(LocationError::Unsupported)
        );
        assert_eq!(tracker.current_location(), Some(settings().fallback));
    }

    #[tokio::test]
    async fn stale_fix_is_rejected() {
        let stale = PositionFix {
            coordinates: HERE,
            captured_at: Utc::now() - chrono::Duration::minutes(10),
        };
        let tracker = tracker(vec![Some(Ok(stale))], false);
        tracker.get_current_location().await;
        assert_eq!(
            tracker.snapshot().state,
            TrackerState::Failed(LocationError::PositionUnavailable)
        );
    }

    #[tokio::test]
    async fn geocoding_failure_keeps_real_coordinates() {
        let tracker = tracker(vec![Some(Ok(PositionFix::now(HERE)))], true);
        tracker.get_current_location().await;

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackerState::Resolved);
        assert!(matches!(
            snapshot.error,
            Some(LocationError::GeocodingFailed(ref m)) if m.contains("503")
        ));
        let location = snapshot.location.unwrap();
        assert_eq!(location.coordinates, HERE);
        assert_eq!(location.address, "28.6100, 77.2100");
        assert_eq!(location.city, "Unknown City");
    }

    #[tokio::test]
    async fn refresh_replaces_location_wholesale() {
        let elsewhere = Coordinates::new(19.07, 72.87);
        let tracker = tracker(
            vec![
                Some(Ok(PositionFix::now(HERE))),
                Some(Err(LocationError::PositionUnavailable)),
                Some(Ok(PositionFix::now(elsewhere))),
            ],
            false,
        );
        let mut updates = tracker.subscribe();

        tracker.get_current_location().await;
        assert_eq!(tracker.current_location().unwrap().coordinates, HERE);

        tracker.refresh_location().await;
        assert_eq!(tracker.current_location(), Some(settings().fallback));

        tracker.refresh_location().await;
        let latest = tracker.snapshot();
        assert_eq!(latest.state, TrackerState::Resolved);
        assert!(latest.error.is_none());
        assert_eq!(latest.location.unwrap().coordinates, elsewhere);
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().state, TrackerState::Resolved);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_refreshes_settle_on_last_completion() {
        let tracker = tracker(
            vec![None, Some(Ok(PositionFix::now(HERE)))],
            false,
        );
        // The first request hangs until the timeout; the second resolves
        // immediately. The timed-out request completes last and wins.
        tokio::join!(tracker.get_current_location(), async {
            tokio::task::yield_now().await;
            tracker.refresh_location().await;
            let mid = tracker.snapshot();
            assert_eq!(mid.state, TrackerState::Resolved);
            assert!(mid.is_loading, "first request is still in flight");
        });

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackerState::Failed(LocationError::Timeout));
        assert!(!snapshot.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_refresh_does_not_leave_tracker_loading() {
        let tracker = tracker(vec![None, Some(Ok(PositionFix::now(HERE)))], false);

        let cancelled =
            tokio::time::timeout(Duration::from_secs(1), tracker.refresh_location()).await;
        assert!(cancelled.is_err(), "provider hangs past the outer deadline");
        assert!(!tracker.snapshot().is_loading);

        tracker.refresh_location().await;
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackerState::Resolved);
        assert!(!snapshot.is_loading, "nothing is in flight any more");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_request_restores_previous_state() {
        let tracker = tracker(
            vec![Some(Err(LocationError::PermissionDenied)), None],
            false,
        );
        tracker.get_current_location().await;

        let _ = tokio::time::timeout(Duration::from_secs(1), tracker.refresh_location()).await;

        let snapshot = tracker.snapshot();
        assert_eq!(
            snapshot.state,
            TrackerState::Failed(LocationError::PermissionDenied)
        );
        assert_eq!(snapshot.error, Some(LocationError::PermissionDenied));
        assert_eq!(snapshot.location, Some(settings().fallback));
        assert!(!snapshot.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_first_request_returns_to_idle() {
        let tracker = tracker(vec![None], false);
        let _ = tokio::time::timeout(Duration::from_secs(1), tracker.get_current_location()).await;

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, TrackerState::Idle);
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.display_label(), "Location unavailable");
    }
}
