use std::sync::Arc;

use crate::{
    core::{
        config::EditorConfig,
        constants::DEFAULT_RADIUS_METERS,
        geo::{GeofenceConfig, Location},
        lifecycle::{LifecycleError, MapLifecycleController, MapLifecycleState},
    },
    engine::{EngineEvent, EngineFactory, EngineGeneration},
    input::{
        events::{EditorEvent, EventSender, LocationRequest, TimerKind, TimerToken},
        geolocation::{GeolocationProvider, LocationError},
    },
    layers::sync::{LayerSyncManager, SyncOutcome},
    runtime::{self, AsyncHandle, TimerScheduler},
    spatial::circle::GeometryError,
    EditorError, Result,
};

pub type ConfirmCallback = Box<dyn FnOnce(GeofenceConfig) + Send>;
pub type CancelCallback = Box<dyn FnOnce() + Send>;

/// The caller's terminal callbacks. Exactly one of them runs per session.
pub struct EditorCallbacks {
    on_confirm: ConfirmCallback,
    on_cancel: CancelCallback,
}

impl EditorCallbacks {
    pub fn new(
        on_confirm: impl FnOnce(GeofenceConfig) + Send + 'static,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            on_confirm: Box::new(on_confirm),
            on_cancel: Box::new(on_cancel),
        }
    }

    pub fn noop() -> Self {
        Self::new(|_| {}, || {})
    }
}

/// What the caller seeds the session with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorOptions {
    pub initial_center: Option<Location>,
    pub initial_radius_meters: f64,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            initial_center: None,
            initial_radius_meters: DEFAULT_RADIUS_METERS,
        }
    }
}

/// Collaborators the editor drives
pub struct EditorDeps {
    pub engine_factory: Box<dyn EngineFactory>,
    pub scheduler: Arc<dyn TimerScheduler>,
    /// Where spawned location requests report back
    pub events: EventSender,
    pub geolocation: Option<GeolocationProvider>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationAvailability {
    /// Nothing has been asked yet
    Unknown,
    Pending,
    /// Last answer; enables "use current location"
    Available(Location),
    Unavailable(LocationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorStatus {
    Open,
    Confirmed,
    Cancelled,
}

impl EditorStatus {
    pub fn is_closed(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// Top-level geofence editor.
///
/// Owns the selection, feeds every change to the [`LayerSyncManager`] and
/// releases the map when the session is confirmed, cancelled or dropped.
pub struct GeofenceEditor {
    config: EditorConfig,
    center: Option<Location>,
    radius_meters: f64,
    lifecycle: MapLifecycleController,
    layer_sync: LayerSyncManager,
    geolocation: Option<GeolocationProvider>,
    location: LocationAvailability,
    location_task: Option<Box<dyn AsyncHandle>>,
    events: EventSender,
    callbacks: Option<EditorCallbacks>,
    status: EditorStatus,
    confirmed: Option<GeofenceConfig>,
}

impl GeofenceEditor {
    /// Opens a session and starts bringing the map up.
    ///
    /// With a geolocation provider, the current location is requested once.
    /// It seeds the center when none is chosen yet and enables
    /// [`use_current_location`](Self::use_current_location). That request runs
    /// on the async runtime, so this must be called from within one.
    pub fn open(
        config: EditorConfig,
        options: EditorOptions,
        deps: EditorDeps,
        callbacks: EditorCallbacks,
    ) -> Result<Self> {
        config.validate()?;
        if let Some(center) = options.initial_center {
            if !center.is_valid() {
                return Err(GeometryError::InvalidCenter {
                    lat: center.lat,
                    lng: center.lng,
                }
                .into());
            }
        }

        let radius_meters = config.radius.clamp(options.initial_radius_meters);
        let map_center = options
            .initial_center
            .unwrap_or(config.map.default_center);
        let lifecycle = MapLifecycleController::new(
            &config,
            map_center,
            deps.engine_factory,
            deps.scheduler.clone(),
        );
        let layer_sync = LayerSyncManager::new(&config, deps.scheduler);

        let mut editor = Self {
            config,
            center: options.initial_center,
            radius_meters,
            lifecycle,
            layer_sync,
            geolocation: deps.geolocation,
            location: LocationAvailability::Unknown,
            location_task: None,
            events: deps.events,
            callbacks: Some(callbacks),
            status: EditorStatus::Open,
            confirmed: None,
        };

        log::info!(
            "geofence editor opened (center: {:?}, radius: {}m)",
            editor.center,
            editor.radius_meters
        );
        editor.lifecycle.start();

        if editor.center.is_some() {
            editor.sync_current();
        }
        // Ask once; seeds the center only if none is chosen by then
        if editor.geolocation.is_some() {
            editor.request_location(LocationRequest::AutoSeed);
        }

        Ok(editor)
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn center(&self) -> Option<Location> {
        self.center
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    /// The selection, once a center has been chosen.
    pub fn current_config(&self) -> Option<GeofenceConfig> {
        self.center
            .map(|center| GeofenceConfig::new(center, self.radius_meters))
    }

    pub fn status(&self) -> EditorStatus {
        self.status
    }

    /// The value handed to `on_confirm`, once confirmed.
    pub fn confirmed(&self) -> Option<GeofenceConfig> {
        self.confirmed
    }

    pub fn lifecycle(&self) -> &MapLifecycleController {
        &self.lifecycle
    }

    /// For registering `on_ready` / `on_error` observers.
    pub fn lifecycle_mut(&mut self) -> &mut MapLifecycleController {
        &mut self.lifecycle
    }

    pub fn layer_sync(&self) -> &LayerSyncManager {
        &self.layer_sync
    }

    pub fn location_availability(&self) -> LocationAvailability {
        self.location
    }

    /// Only after the provider has answered successfully.
    pub fn can_use_current_location(&self) -> bool {
        !self.status.is_closed()
            && self.geolocation.is_some()
            && matches!(self.location, LocationAvailability::Available(_))
    }

    /// Error the map is currently stuck in, if any.
    pub fn map_error(&self) -> Option<&LifecycleError> {
        match self.lifecycle.state() {
            MapLifecycleState::Error(cause) => Some(cause),
            _ => None,
        }
    }

    pub fn handle_click(&mut self, location: Location) -> Result<Option<SyncOutcome>> {
        self.ensure_open()?;
        let center = location.normalized();
        log::debug!("center set to ({:.6}, {:.6})", center.lat, center.lng);
        self.center = Some(center);
        Ok(self.sync_current())
    }

    /// Stores the radius clamped to the configured limits and returns it.
    pub fn set_radius(&mut self, radius_meters: f64) -> Result<f64> {
        self.ensure_open()?;
        let clamped = self.config.radius.clamp(radius_meters);
        if clamped != radius_meters {
            log::debug!("radius {} clamped to {}", radius_meters, clamped);
        }
        self.radius_meters = clamped;
        self.sync_current();
        Ok(clamped)
    }

    /// Asks for the current location; the answer arrives as
    /// [`EditorEvent::LocationResolved`].
    pub fn use_current_location(&mut self) -> Result<()> {
        self.ensure_open()?;
        if !self.can_use_current_location() {
            return Err(EditorError::LocationDisabled);
        }
        self.request_location(LocationRequest::Explicit);
        Ok(())
    }

    pub fn apply_location_result(
        &mut self,
        request: LocationRequest,
        result: std::result::Result<Location, LocationError>,
    ) -> Result<Option<SyncOutcome>> {
        if self.status.is_closed() {
            log::debug!("location result after close ignored");
            return Ok(None);
        }
        self.location_task = None;

        let location = match result {
            Ok(location) => location,
            Err(err) => {
                log::info!("current location unavailable: {}", err);
                self.location = LocationAvailability::Unavailable(err);
                return match request {
                    LocationRequest::Explicit => Err(err.into()),
                    LocationRequest::AutoSeed => Ok(None),
                };
            }
        };

        self.location = LocationAvailability::Available(location);
        if request == LocationRequest::AutoSeed && self.center.is_some() {
            log::debug!("center already chosen, not seeding from location");
            return Ok(None);
        }

        self.center = Some(location);
        self.lifecycle.set_center(location);
        Ok(self.sync_current())
    }

    /// Routes an engine notification; redraws when the map becomes ready.
    pub fn handle_engine_event(
        &mut self,
        generation: EngineGeneration,
        event: EngineEvent,
    ) -> Option<MapLifecycleState> {
        if self.status.is_closed() {
            return None;
        }
        let transition = self.lifecycle.handle_engine_event(generation, event);
        if matches!(transition, Some(MapLifecycleState::StyleReady)) {
            self.sync_current();
        }
        transition
    }

    pub fn handle_timer(&mut self, token: TimerToken) {
        if self.status.is_closed() {
            return;
        }
        match token.kind {
            TimerKind::SyncRetry => {
                if self.layer_sync.take_due_retry(token) {
                    self.sync_current();
                }
            }
            TimerKind::BringUpTimeout => {
                self.lifecycle.handle_timer(token);
            }
        }
    }

    pub fn set_credential(&mut self, token: impl Into<String>) {
        self.lifecycle.set_credential(token);
    }

    /// Rebuilds a failed map around the current selection.
    pub fn retry_map(&mut self) -> Result<()> {
        self.ensure_open()?;
        if let Some(center) = self.center {
            self.lifecycle.set_center(center);
        }
        self.lifecycle.retry();
        Ok(())
    }

    /// Finalizes the session and hands the selection to `on_confirm`.
    pub fn confirm(&mut self) -> Result<GeofenceConfig> {
        self.ensure_open()?;
        let config = self.current_config().ok_or(EditorError::NoSelection)?;

        self.close(EditorStatus::Confirmed);
        self.confirmed = Some(config);
        log::info!(
            "geofence confirmed: ({:.6}, {:.6}) r={}m",
            config.center.lat,
            config.center.lng,
            config.radius_meters
        );
        if let Some(callbacks) = self.callbacks.take() {
            (callbacks.on_confirm)(config);
        }
        Ok(config)
    }

    /// Discards the session and calls `on_cancel`. Does nothing once closed.
    pub fn cancel(&mut self) {
        if self.status.is_closed() {
            return;
        }
        self.close(EditorStatus::Cancelled);
        log::info!("geofence editor cancelled");
        if let Some(callbacks) = self.callbacks.take() {
            (callbacks.on_cancel)();
        }
    }

    /// Applies one session event and reports the resulting status.
    pub fn handle_event(&mut self, event: EditorEvent) -> Result<EditorStatus> {
        match event {
            EditorEvent::Engine { generation, event } => {
                self.handle_engine_event(generation, event);
            }
            EditorEvent::MapClick(location) => {
                self.handle_click(location)?;
            }
            EditorEvent::RadiusInput(radius) => {
                self.set_radius(radius)?;
            }
            EditorEvent::Timer(token) => self.handle_timer(token),
            EditorEvent::LocationResolved { request, result } => {
                self.apply_location_result(request, result)?;
            }
            EditorEvent::UseCurrentLocation => self.use_current_location()?,
            EditorEvent::SetCredential(token) => self.set_credential(token),
            EditorEvent::RetryMap => self.retry_map()?,
            EditorEvent::Confirm => {
                self.confirm()?;
            }
            EditorEvent::Cancel => self.cancel(),
        }
        Ok(self.status)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.status.is_closed() {
            Err(EditorError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn sync_current(&mut self) -> Option<SyncOutcome> {
        if self.status.is_closed() {
            return None;
        }
        let config = self.current_config()?;
        Some(self.layer_sync.sync(&config, &mut self.lifecycle))
    }

    fn request_location(&mut self, request: LocationRequest) {
        let Some(provider) = self.geolocation.clone() else {
            return;
        };
        if let Some(task) = self.location_task.take() {
            task.cancel();
        }
        if !matches!(self.location, LocationAvailability::Available(_)) {
            self.location = LocationAvailability::Pending;
        }

        let events = self.events.clone();
        self.location_task = Some(runtime::spawn(async move {
            let result = provider.request_current_location().await;
            let _ = events.send(EditorEvent::LocationResolved { request, result });
        }));
    }

    fn close(&mut self, status: EditorStatus) {
        self.status = status;
        if let Some(task) = self.location_task.take() {
            task.cancel();
        }
        self.layer_sync.dispose();
        self.lifecycle.dispose();
    }
}

impl Drop for GeofenceEditor {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for GeofenceEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeofenceEditor")
            .field("center", &self.center)
            .field("radius_meters", &self.radius_meters)
            .field("status", &self.status)
            .field("lifecycle", &self.lifecycle)
            .field("layer_sync", &self.layer_sync)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}
