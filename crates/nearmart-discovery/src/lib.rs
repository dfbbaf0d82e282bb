//! Geospatial discovery engine: tracks the user's location, ranks nearby
//! listings and keeps a map surface's markers in step with them.

pub mod discovery;
pub mod error;
pub mod file_store;
pub mod gate;
pub mod handle;
pub mod markers;
pub mod nearby;
pub mod ports;
pub mod tracker;

pub use discovery::{CycleOutcome, DiscoveryLoop, LoopSettings};
pub use error::{BoxError, LocationError, MapError, StoreError};
pub use file_store::FileListingsStore;
pub use gate::{should_refresh, DEFAULT_MOVEMENT_THRESHOLD_KM};
pub use handle::DiscoveryHandle;
pub use markers::{markers_for, reconcile, ActivationToken, MapMarker, MarkerDiff, MarkerReconciler};
pub use ports::{ListingsStore, LocationProvider, MapSurface, PositionFix, ReverseGeocoder};
pub use tracker::{LocationTracker, TrackerSettings, TrackerSnapshot, TrackerState};
