//! Running a [`DiscoveryLoop`] on a periodic timer.
//!
//! The loop runs in one task: ticks, location re-polls and presentation
//! commands are handled strictly one after another, so a cycle's listing
//! fetch and marker reconciliation always finish before anything else reads
//! or writes the nearby set. Dropping or shutting down the
//! [`DiscoveryHandle`] stops the timer and destroys the map surface.

use std::sync::Arc;
use std::time::Duration;

use nearmart_core::NearbyListing;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

use crate::discovery::{CycleOutcome, DiscoveryLoop};
use crate::error::MapError;
use crate::markers::ActivationToken;
use crate::ports::MapSurface;
use crate::tracker::TrackerSnapshot;

enum Command {
    AttachMap {
        surface: Box<dyn MapSurface>,
        reply: oneshot::Sender<Result<(), MapError>>,
    },
    RefreshLocation,
    CenterOnUser { zoom: u8 },
    Activate(ActivationToken),
    ClearSelection,
}

/// Presentation-side handle to a running discovery loop.
pub struct DiscoveryHandle {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<DiscoveryLoop>>,
    nearby: watch::Receiver<Vec<NearbyListing>>,
    selection: watch::Receiver<Option<NearbyListing>>,
    location: watch::Receiver<TrackerSnapshot>,
    cycles: watch::Receiver<Option<CycleOutcome>>,
}

impl DiscoveryLoop {
    /// Start the periodic loop.
    ///
    /// The location is resolved once and a cycle runs immediately; after
    /// that a cycle runs every `tick_interval`. Must be called from within a
    /// Tokio runtime.
    #[must_use]
    pub fn spawn(self) -> DiscoveryHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (cycles_tx, cycles_rx) = watch::channel(None);

        let nearby = self.subscribe_nearby();
        let selection = self.subscribe_selection();
        let location = self.tracker().subscribe();

        let task = tokio::spawn(run(self, commands_rx, shutdown_rx, cycles_tx));

        DiscoveryHandle {
            commands: commands_tx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            nearby,
            selection,
            location,
            cycles: cycles_rx,
        }
    }
}

async fn run(
    mut discovery: DiscoveryLoop,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut shutdown: oneshot::Receiver<()>,
    cycles: watch::Sender<Option<CycleOutcome>>,
) -> DiscoveryLoop {
    let settings = discovery.settings().clone();
    tracing::info!(
        tick_ms = u64::try_from(settings.tick_interval.as_millis()).unwrap_or(u64::MAX),
        radius_km = settings.radius_km,
        "discovery loop started"
    );

    let tracker = Arc::clone(discovery.tracker());
    tracker.get_current_location().await;

    let mut ticker = tokio::time::interval(settings.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut repoll = settings.location_repoll.map(|period| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            Some(command) = commands.recv() => handle_command(&mut discovery, command).await,
            () = tick_optional(repoll.as_mut()) => tracker.refresh_location().await,
            _ = ticker.tick() => {
                let outcome = discovery.run_cycle().await;
                cycles.send_replace(Some(outcome));
            }
        }
    }

    discovery.teardown();
    tracing::info!("discovery loop stopped");
    discovery
}

async fn tick_optional(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn handle_command(discovery: &mut DiscoveryLoop, command: Command) {
    match command {
        Command::AttachMap { surface, reply } => {
            let result = discovery.attach_map(surface).await;
            // The caller may have stopped waiting for the answer.
            let _ = reply.send(result);
        }
        Command::RefreshLocation => discovery.refresh_location().await,
        Command::CenterOnUser { zoom } => discovery.center_on_user(zoom),
        Command::Activate(token) => {
            discovery.activate(&token);
        }
        Command::ClearSelection => discovery.clear_selection(),
    }
}

impl DiscoveryHandle {
    /// Hand a map surface to the loop and wait for its initialization.
    ///
    /// # Errors
    ///
    /// Returns the surface's [`MapError`], or [`MapError::NotAttached`] if
    /// the loop has already stopped.
    pub async fn attach_map(&self, surface: Box<dyn MapSurface>) -> Result<(), MapError> {
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(Command::AttachMap { surface, reply })
            .map_err(|_| MapError::NotAttached)?;
        answer.await.map_err(|_| MapError::NotAttached)?
    }

    pub fn refresh_location(&self) {
        self.send(Command::RefreshLocation);
    }

    pub fn center_on_user(&self, zoom: u8) {
        self.send(Command::CenterOnUser { zoom });
    }

    /// Forward a marker activation; the selection is published on
    /// [`DiscoveryHandle::selection`].
    pub fn activate(&self, token: ActivationToken) {
        self.send(Command::Activate(token));
    }

    pub fn clear_selection(&self) {
        self.send(Command::ClearSelection);
    }

    #[must_use]
    pub fn nearby(&self) -> watch::Receiver<Vec<NearbyListing>> {
        self.nearby.clone()
    }

    #[must_use]
    pub fn selection(&self) -> watch::Receiver<Option<NearbyListing>> {
        self.selection.clone()
    }

    #[must_use]
    pub fn location(&self) -> watch::Receiver<TrackerSnapshot> {
        self.location.clone()
    }

    /// Outcome of the most recent cycle; `None` before the first one.
    #[must_use]
    pub fn cycles(&self) -> watch::Receiver<Option<CycleOutcome>> {
        self.cycles.clone()
    }

    /// Stop the timer, destroy the map surface and hand back the loop.
    ///
    /// Returns `None` if the loop task panicked or was already joined.
    pub async fn shutdown(mut self) -> Option<DiscoveryLoop> {
        if let Some(stop) = self.shutdown.take() {
            let _ = stop.send(());
        }
        let task = self.task.take()?;
        match task.await {
            Ok(discovery) => Some(discovery),
            Err(err) => {
                tracing::error!(error = %err, "discovery loop task failed");
                None
            }
        }
    }

    /// Like [`DiscoveryHandle::shutdown`] but gives up after `grace`.
    pub async fn shutdown_within(self, grace: Duration) -> Option<DiscoveryLoop> {
        tokio::time::timeout(grace, self.shutdown())
            .await
            .ok()
            .flatten()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("discovery loop already stopped; dropping command");
        }
    }
}

impl Drop for DiscoveryHandle {
    fn drop(&mut self) {
        // Closing the shutdown channel stops the loop, whose teardown then
        // destroys the map surface.
        if let Some(stop) = self.shutdown.take() {
            let _ = stop.send(());
        }
    }
}
