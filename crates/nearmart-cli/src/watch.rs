//! `nearmart watch`: the full discovery loop against the listings file.

use std::sync::Arc;
use std::time::Duration;

use nearmart_core::{Coordinates, EngineConfig};
use nearmart_discovery::{
    CycleOutcome, DiscoveryLoop, FileListingsStore, LocationProvider, LocationTracker,
    LoopSettings, TrackerSettings,
};
use nearmart_geocode::NominatimClient;

use crate::provider::{FixedLocationProvider, UnsupportedProvider};
use crate::query::print_nearby;
use crate::surface::LoggingMapSurface;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Run the discovery loop until ctrl-c/SIGTERM or until `ticks` cycles
/// have been reported.
///
/// # Errors
///
/// Returns an error if the geocoder client cannot be constructed.
pub(crate) async fn run_watch(
    config: EngineConfig,
    position: Option<(f64, f64)>,
    ticks: Option<u64>,
) -> anyhow::Result<()> {
    let provider: Arc<dyn LocationProvider> = match position {
        Some((lat, lng)) => Arc::new(FixedLocationProvider::new(Coordinates::new(lat, lng))),
        None => Arc::new(UnsupportedProvider),
    };
    let geocoder = Arc::new(NominatimClient::from_config(&config)?);
    let tracker = Arc::new(LocationTracker::new(
        provider,
        geocoder,
        TrackerSettings::from_config(&config),
    ));
    let store = Arc::new(FileListingsStore::new(&config.listings_path));

    tracing::info!(
        listings = %config.listings_path.display(),
        radius_km = config.radius_km,
        "starting watch"
    );
    let handle = DiscoveryLoop::new(tracker, store, LoopSettings::from_config(&config)).spawn();

    if let Err(err) = handle.attach_map(Box::new(LoggingMapSurface::new())).await {
        tracing::warn!(error = %err, "continuing without a map surface");
    }

    let mut cycles = handle.cycles();
    let nearby = handle.nearby();
    let location = handle.location();
    let mut reported = 0u64;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            changed = cycles.changed() => {
                if changed.is_err() {
                    tracing::warn!("discovery loop stopped unexpectedly");
                    break;
                }
                let Some(outcome) = *cycles.borrow_and_update() else {
                    continue;
                };
                reported += 1;
                let label = location.borrow().display_label();
                match outcome {
                    CycleOutcome::Refreshed { nearby: count, .. } => {
                        println!("[{reported}] {label}: {count} listing(s) nearby");
                        print_nearby(&nearby.borrow());
                    }
                    CycleOutcome::Unchanged => println!("[{reported}] {label}: unchanged"),
                    CycleOutcome::Skipped => println!("[{reported}] waiting for a location"),
                    CycleOutcome::FetchFailed => {
                        println!("[{reported}] {label}: listings unavailable, keeping last results");
                    }
                }
                if ticks.is_some_and(|limit| reported >= limit) {
                    break;
                }
            }
        }
    }

    if handle.shutdown_within(SHUTDOWN_GRACE).await.is_none() {
        tracing::warn!("discovery loop did not stop cleanly");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, stopping");
}
