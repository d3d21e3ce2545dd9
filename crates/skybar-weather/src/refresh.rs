//! Refresh cycle coordination: resolve, fetch, transform, publish.
//!
//! At most one cycle runs at a time. Triggers arriving mid-cycle are queued
//! and collapse into a single follow-up cycle that starts after the running
//! one has published.

use parking_lot::Mutex;
use skybar_core::{Settings, SettingsStore, StorageError};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::instrument;

use crate::location::CoordinateResolver;
use crate::provider::FetchOrchestrator;
use crate::transform::ForecastTransformer;
use crate::types::{
    Coordinates, DisplaySettings, FetchSettings, ForecastSnapshot, LocationError, WeatherError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshState {
    #[default]
    Idle,
    ResolvingLocation,
    Fetching,
    Done,
    Failed,
}

/// Everything a dashboard renders, published as one value per change
#[derive(Debug, Clone, Default)]
pub struct DashboardView {
    pub state: RefreshState,
    /// Latest published forecast; survives failed cycles
    pub snapshot: Option<Arc<ForecastSnapshot>>,
    pub error: Option<String>,
    pub warning: Option<String>,
    /// Coordinates the snapshot was fetched for
    pub location: Option<Coordinates>,
    /// Number of the cycle that produced this view
    pub cycle: u64,
}

#[derive(Debug, Default)]
struct Inner {
    view: DashboardView,
    in_flight: bool,
    /// Force flag of the queued follow-up cycle, if any
    pending: Option<bool>,
    /// Sequence number of the newest started cycle
    cycle: u64,
}

/// Owns the current location and snapshot and sequences refresh cycles.
pub struct RefreshController {
    resolver: CoordinateResolver,
    orchestrator: FetchOrchestrator,
    transformer: ForecastTransformer,
    settings: Arc<SettingsStore>,
    inner: Mutex<Inner>,
    tx: watch::Sender<DashboardView>,
}

impl RefreshController {
    pub fn new(
        resolver: CoordinateResolver,
        orchestrator: FetchOrchestrator,
        transformer: ForecastTransformer,
        settings: Arc<SettingsStore>,
    ) -> Self {
        let (tx, _rx) = watch::channel(DashboardView::default());
        Self {
            resolver,
            orchestrator,
            transformer,
            settings,
            inner: Mutex::new(Inner::default()),
            tx,
        }
    }

    /// Receive every published view.
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.tx.subscribe()
    }

    pub fn view(&self) -> DashboardView {
        self.tx.borrow().clone()
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.settings.current()
    }

    /// Settings were (re)loaded; `display_changed` forces a fetch.
    pub async fn on_settings_loaded(&self, display_changed: bool) {
        self.trigger(display_changed).await;
    }

    /// User asked for fresh data.
    pub async fn on_manual_refresh(&self) {
        self.trigger(true).await;
    }

    /// Read persisted settings and refresh.
    ///
    /// On a read failure the previous settings stay active, the error is
    /// published and no cycle runs.
    pub async fn load_settings(&self) {
        match self.settings.reload() {
            Ok(changed) => self.on_settings_loaded(changed).await,
            Err(e) => {
                tracing::warn!("Failed to load settings: {}", e);
                let mut inner = self.inner.lock();
                inner.view.state = RefreshState::Failed;
                inner.view.error = Some(e.user_message().to_string());
                self.publish(&inner);
            }
        }
    }

    /// Persist `settings` and refresh with them.
    pub async fn save_settings(&self, settings: Settings) -> Result<(), StorageError> {
        let changed = self.settings.save(&settings)?;
        self.on_settings_loaded(changed).await;
        Ok(())
    }

    /// Restore default settings and refresh.
    pub async fn reset_settings(&self) -> Result<(), StorageError> {
        let changed = self.settings.reset()?;
        self.on_settings_loaded(changed).await;
        Ok(())
    }

    /// One-off device lookup for the settings form, bypassing the refresh cycle.
    pub async fn locate_now(&self) -> Result<Coordinates, LocationError> {
        self.resolver.locate().await
    }

    /// Run a refresh cycle, or queue one if a cycle is already running.
    ///
    /// Returns once the queue is drained, or immediately when queued.
    #[instrument(skip(self), level = "debug")]
    pub async fn trigger(&self, force: bool) {
        let mut force = force;
        {
            let mut inner = self.inner.lock();
            if inner.in_flight {
                tracing::debug!("Refresh in flight, queueing");
                inner.pending = Some(inner.pending.unwrap_or(false) || force);
                return;
            }
            inner.in_flight = true;
        }

        loop {
            self.run_cycle(force).await;

            let mut inner = self.inner.lock();
            match inner.pending.take() {
                Some(next) => force = next,
                None => {
                    inner.in_flight = false;
                    break;
                }
            }
        }
    }

    async fn run_cycle(&self, force: bool) {
        let ticket = {
            let mut inner = self.inner.lock();
            inner.cycle += 1;
            inner.view.cycle = inner.cycle;
            inner.view.state = RefreshState::ResolvingLocation;
            inner.view.error = None;
            inner.view.warning = None;
            self.publish(&inner);
            inner.cycle
        };

        let settings = self.settings.current();
        let fallback = Coordinates::from_parts(settings.default_latitude, settings.default_longitude);

        let coords = match self.resolver.resolve(settings.use_geolocation, fallback).await {
            Ok(coords) => coords,
            Err(e) => return self.fail(ticket, e),
        };

        {
            let mut inner = self.inner.lock();
            if !force && inner.view.location == Some(coords) {
                tracing::debug!("Location unchanged, skipping fetch");
                inner.view.state = RefreshState::Done;
                self.publish(&inner);
                return;
            }
            inner.view.state = RefreshState::Fetching;
            self.publish(&inner);
        }

        let outcome = match self
            .orchestrator
            .fetch(coords, &FetchSettings::from(&*settings))
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(ticket, e),
        };

        let mut snapshot = self
            .transformer
            .transform(&outcome.payload, &DisplaySettings::from(&*settings));
        snapshot.stale = outcome.is_stale();

        let mut inner = self.inner.lock();
        if Self::superseded(&inner, ticket) {
            return;
        }
        // Cached data is not tied to these coordinates; leave the location
        // unset so the next trigger fetches again.
        inner.view.location = (!snapshot.stale).then_some(coords);
        inner.view.snapshot = Some(Arc::new(snapshot));
        inner.view.warning = outcome.warning().map(|w| w.message().to_string());
        inner.view.state = RefreshState::Done;
        self.publish(&inner);
        tracing::info!("Forecast updated for {}", coords.query_value());
    }

    fn fail(&self, ticket: u64, error: WeatherError) {
        let mut inner = self.inner.lock();
        if Self::superseded(&inner, ticket) {
            return;
        }
        tracing::error!("Refresh failed: {}", error);
        inner.view.state = RefreshState::Failed;
        inner.view.error = Some(error.user_message());
        self.publish(&inner);
    }

    /// A completion from any cycle but the newest one is dropped.
    fn superseded(inner: &Inner, ticket: u64) -> bool {
        if inner.cycle == ticket {
            return false;
        }
        tracing::debug!("Discarding result of superseded refresh cycle {}", ticket);
        true
    }

    fn publish(&self, inner: &Inner) {
        self.tx.send_replace(inner.view.clone());
    }
}
