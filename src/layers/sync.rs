//! Boundary layer synchronization
//!
//! [`LayerSyncManager`] keeps exactly one drawn generation of boundary layers on
//! the map. Every sync that reaches a ready map releases the previous
//! [`DrawnLayerHandle`] wholesale before creating the next one. Syncs that
//! arrive while the map is not ready collapse into a single pending retry.

use std::{sync::Arc, time::Duration};

use crate::{
    core::{
        config::EditorConfig,
        constants::{BOUNDARY_FILL_PREFIX, BOUNDARY_SOURCE_PREFIX, BOUNDARY_STROKE_PREFIX},
        geo::GeofenceConfig,
        lifecycle::MapLifecycleController,
    },
    engine::{
        EngineError, EngineGeneration, LayerPaint, LayerSpec, MapEngine, MarkerId, MarkerSpec,
        SourceSpec,
    },
    input::events::{TimerKind, TimerToken},
    layers::style::BoundaryStyle,
    runtime::{AsyncHandle, TimerScheduler},
    spatial::circle::{CircleApproximator, GeometryError},
};

/// The one live set of boundary layers on the map
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnLayerHandle {
    /// Engine instance the layers were drawn on
    pub generation: EngineGeneration,
    pub source_id: String,
    pub fill_layer_id: String,
    pub stroke_layer_id: String,
    pub marker: MarkerId,
    /// Selection the layers were drawn from
    pub config: GeofenceConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// A fresh boundary replaced the previous one
    Drawn,
    /// The map was not ready; `retry_scheduled` is false when a retry was
    /// already pending or the map needs an explicit retry first
    Deferred { retry_scheduled: bool },
    /// The selection has no valid boundary; the last one stays on the map
    KeptPrevious(GeometryError),
    /// The engine rejected the new layers; nothing is drawn
    Failed(EngineError),
    /// The session is disposed
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub syncs: u64,
    pub draws: u64,
    pub deferred: u64,
    pub retries_scheduled: u64,
    pub cleanup_failures: u64,
}

struct PendingRetry {
    token: TimerToken,
    handle: Box<dyn AsyncHandle>,
}

pub struct LayerSyncManager {
    approximator: CircleApproximator,
    style: BoundaryStyle,
    retry_backoff: Duration,
    recenter: bool,
    zoom: f64,
    scheduler: Arc<dyn TimerScheduler>,
    pending_retry: Option<PendingRetry>,
    next_timer_id: u64,
    next_draw_id: u64,
    handle: Option<DrawnLayerHandle>,
    disposed: bool,
    stats: SyncStats,
}

impl LayerSyncManager {
    pub fn new(config: &EditorConfig, scheduler: Arc<dyn TimerScheduler>) -> Self {
        Self {
            approximator: CircleApproximator::new(
                config.segments(),
                config.geometry.pole_epsilon_degrees,
            ),
            style: config.style.clone(),
            retry_backoff: config.sync.retry_backoff(),
            recenter: config.map.recenter_on_sync,
            zoom: config.map.zoom,
            scheduler,
            pending_retry: None,
            next_timer_id: 0,
            next_draw_id: 0,
            handle: None,
            disposed: false,
            stats: SyncStats::default(),
        }
    }

    pub fn handle(&self) -> Option<&DrawnLayerHandle> {
        self.handle.as_ref()
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub fn has_pending_retry(&self) -> bool {
        self.pending_retry.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Draws `config` if the map is ready, otherwise defers to a single retry.
    pub fn sync(
        &mut self,
        config: &GeofenceConfig,
        lifecycle: &mut MapLifecycleController,
    ) -> SyncOutcome {
        self.stats.syncs += 1;

        if self.disposed || lifecycle.is_disposed() {
            log::debug!("sync skipped, session disposed");
            return SyncOutcome::Skipped;
        }

        let generation = lifecycle.generation();
        let is_error = lifecycle.state().is_error();
        let Some(engine) = lifecycle.engine_mut() else {
            return self.defer(is_error);
        };

        let boundary = match self.approximator.approximate(config) {
            Ok(boundary) => boundary,
            Err(err) => {
                log::warn!("keeping previous boundary: {}", err);
                return SyncOutcome::KeptPrevious(err);
            }
        };

        self.cancel_pending_retry();
        self.release_handle(&mut *engine, generation);

        self.next_draw_id += 1;
        let draw_id = self.next_draw_id;
        let source_id = format!("{BOUNDARY_SOURCE_PREFIX}-{draw_id}");
        let fill_layer_id = format!("{BOUNDARY_FILL_PREFIX}-{draw_id}");
        let stroke_layer_id = format!("{BOUNDARY_STROKE_PREFIX}-{draw_id}");

        let drawn = draw(
            &mut *engine,
            &self.style,
            SourceSpec {
                id: source_id.clone(),
                data: boundary.to_geojson(),
            },
            &fill_layer_id,
            &stroke_layer_id,
            config,
        );

        let marker = match drawn {
            Ok(marker) => marker,
            Err(err) => {
                log::warn!("failed to draw geofence boundary: {}", err);
                // Roll back whatever made it onto the map
                for id in [&stroke_layer_id, &fill_layer_id] {
                    let result = engine.remove_layer(id);
                    self.record_cleanup(result);
                }
                let result = engine.remove_source(&source_id);
                self.record_cleanup(result);
                return SyncOutcome::Failed(err);
            }
        };

        if self.recenter {
            engine.fly_to(config.center, self.zoom);
        }

        log::debug!(
            "drew geofence boundary {} at ({:.6}, {:.6}) r={}m",
            draw_id,
            config.center.lat,
            config.center.lng,
            config.radius_meters
        );
        self.handle = Some(DrawnLayerHandle {
            generation,
            source_id,
            fill_layer_id,
            stroke_layer_id,
            marker,
            config: *config,
        });
        self.stats.draws += 1;
        SyncOutcome::Drawn
    }

    /// Clears the pending slot if `token` is the retry it holds. Returns true
    /// when the caller should sync again with its current selection.
    pub fn take_due_retry(&mut self, token: TimerToken) -> bool {
        let is_pending = self
            .pending_retry
            .as_ref()
            .is_some_and(|pending| pending.token == token);
        if !is_pending {
            log::debug!("ignoring stale sync retry {:?}", token);
            return false;
        }
        self.pending_retry = None;
        !self.disposed
    }

    /// Stops all future work. Layers are left to the engine teardown.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.cancel_pending_retry();
        self.handle = None;
    }

    fn defer(&mut self, map_failed: bool) -> SyncOutcome {
        self.stats.deferred += 1;

        if self.pending_retry.is_some() {
            return SyncOutcome::Deferred {
                retry_scheduled: false,
            };
        }
        if map_failed {
            // A failed map only recovers through retry(), which redraws on ready
            log::debug!("sync deferred until the map is rebuilt");
            return SyncOutcome::Deferred {
                retry_scheduled: false,
            };
        }

        self.next_timer_id += 1;
        let token = TimerToken::new(TimerKind::SyncRetry, self.next_timer_id);
        let handle = self.scheduler.schedule(self.retry_backoff, token);
        self.pending_retry = Some(PendingRetry { token, handle });
        self.stats.retries_scheduled += 1;
        log::debug!("map not ready, sync retry in {:?}", self.retry_backoff);

        SyncOutcome::Deferred {
            retry_scheduled: true,
        }
    }

    fn cancel_pending_retry(&mut self) {
        if let Some(pending) = self.pending_retry.take() {
            pending.handle.cancel();
        }
    }

    fn release_handle(&mut self, engine: &mut dyn MapEngine, generation: EngineGeneration) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.generation != generation {
            // Drawn on an engine instance that no longer exists
            return;
        }

        let results = [
            engine.remove_layer(&handle.stroke_layer_id),
            engine.remove_layer(&handle.fill_layer_id),
            engine.remove_source(&handle.source_id),
            engine.remove_marker(handle.marker),
        ];
        for result in results {
            self.record_cleanup(result);
        }
    }

    /// Missing items count as removed; anything else is a cleanup failure.
    fn record_cleanup(&mut self, result: Result<(), EngineError>) {
        match result {
            Ok(()) => {}
            Err(err) if err.is_not_found() => log::debug!("already removed: {}", err),
            Err(err) => {
                self.stats.cleanup_failures += 1;
                log::warn!("failed to remove boundary item: {}", err);
            }
        }
    }
}

fn draw(
    engine: &mut dyn MapEngine,
    style: &BoundaryStyle,
    source: SourceSpec,
    fill_layer_id: &str,
    stroke_layer_id: &str,
    config: &GeofenceConfig,
) -> Result<MarkerId, EngineError> {
    let source_id = source.id.clone();
    engine.add_source(source)?;
    engine.add_layer(LayerSpec {
        id: fill_layer_id.to_string(),
        source: source_id.clone(),
        paint: LayerPaint::Fill {
            color: style.fill_color.to_hex(),
            opacity: style.fill_opacity,
        },
    })?;
    engine.add_layer(LayerSpec {
        id: stroke_layer_id.to_string(),
        source: source_id,
        paint: LayerPaint::Line {
            color: style.stroke_color.to_hex(),
            width: style.stroke_width,
        },
    })?;
    engine.add_marker(MarkerSpec {
        position: config.center,
        color: style.marker_color.to_hex(),
    })
}

impl std::fmt::Debug for LayerSyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerSyncManager")
            .field("handle", &self.handle)
            .field("pending_retry", &self.pending_retry.as_ref().map(|p| p.token))
            .field("disposed", &self.disposed)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{geo::Location, lifecycle::MapLifecycleState},
        engine::{
            headless::{EngineCall, EngineRecorder, HeadlessEngineFactory},
            EngineEvent, EngineFactory, EngineOptions,
        },
        runtime::ManualScheduler,
    };

    struct Fixture {
        lifecycle: MapLifecycleController,
        sync: LayerSyncManager,
        scheduler: ManualScheduler,
        recorder: EngineRecorder,
    }

    fn fixture() -> Fixture {
        let config = EditorConfig::default().with_access_token("pk.test");
        let scheduler = ManualScheduler::new();
        let recorder = EngineRecorder::new();
        let lifecycle = MapLifecycleController::new(
            &config,
            config.map.default_center,
            Box::new(HeadlessEngineFactory::new(recorder.clone())),
            Arc::new(scheduler.clone()),
        );
        let sync = LayerSyncManager::new(&config, Arc::new(scheduler.clone()));
        Fixture {
            lifecycle,
            sync,
            scheduler,
            recorder,
        }
    }

    fn make_ready(lifecycle: &mut MapLifecycleController) {
        lifecycle.start();
        let generation = lifecycle.generation();
        lifecycle.handle_engine_event(generation, EngineEvent::Load);
        lifecycle.handle_engine_event(generation, EngineEvent::StyleLoad);
        assert_eq!(lifecycle.state(), &MapLifecycleState::StyleReady);
    }

    fn fence(radius: f64) -> GeofenceConfig {
        GeofenceConfig::new(Location::new(28.6139, 77.2090), radius)
    }

    #[test]
    fn test_not_ready_coalesces_into_one_retry() {
        let mut f = fixture();
        f.lifecycle.start();

        assert_eq!(
            f.sync.sync(&fence(50.0), &mut f.lifecycle),
            SyncOutcome::Deferred {
                retry_scheduled: true
            }
        );
        assert_eq!(
            f.sync.sync(&fence(60.0), &mut f.lifecycle),
            SyncOutcome::Deferred {
                retry_scheduled: false
            }
        );

        assert_eq!(f.scheduler.scheduled_count(), 1);
        let pending = f.scheduler.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(f.scheduler.delay_of(pending[0]), Some(Duration::from_millis(500)));
        assert_eq!(f.recorder.mutation_count(), 0);
        assert_eq!(f.sync.stats().retries_scheduled, 1);
    }

    #[test]
    fn test_ready_sync_draws_one_set() {
        let mut f = fixture();
        make_ready(&mut f.lifecycle);

        assert_eq!(f.sync.sync(&fence(50.0), &mut f.lifecycle), SyncOutcome::Drawn);
        assert_eq!(f.sync.sync(&fence(75.0), &mut f.lifecycle), SyncOutcome::Drawn);
        assert_eq!(f.sync.sync(&fence(90.0), &mut f.lifecycle), SyncOutcome::Drawn);

        assert_eq!(f.recorder.live_layer_count(), 2);
        assert_eq!(f.recorder.live_source_count(), 1);
        assert_eq!(f.recorder.live_marker_count(), 1);
        assert_eq!(f.sync.handle().unwrap().config.radius_meters, 90.0);
        assert_eq!(f.sync.stats().cleanup_failures, 0);
    }

    #[test]
    fn test_redraw_removes_before_adding() {
        let mut f = fixture();
        make_ready(&mut f.lifecycle);
        f.sync.sync(&fence(50.0), &mut f.lifecycle);
        let old = f.sync.handle().cloned().unwrap();
        f.recorder.clear_calls();

        f.sync.sync(&fence(80.0), &mut f.lifecycle);
        let calls = f.recorder.calls();
        let last_removal = calls
            .iter()
            .rposition(|c| {
                matches!(c, EngineCall::RemoveLayer(_) | EngineCall::RemoveSource(_) | EngineCall::RemoveMarker(_))
            })
            .unwrap();
        let first_addition = calls
            .iter()
            .position(|c| {
                matches!(c, EngineCall::AddLayer(_) | EngineCall::AddSource(_) | EngineCall::AddMarker(_))
            })
            .unwrap();
        assert!(last_removal < first_addition);
        assert!(calls.contains(&EngineCall::RemoveLayer(old.fill_layer_id)));
        assert!(calls.contains(&EngineCall::RemoveMarker(old.marker)));
    }

    #[test]
    fn test_ready_sync_cancels_pending_retry() {
        let mut f = fixture();
        f.lifecycle.start();
        f.sync.sync(&fence(50.0), &mut f.lifecycle);
        let token = f.scheduler.pending()[0];

        let generation = f.lifecycle.generation();
        f.lifecycle.handle_engine_event(generation, EngineEvent::Load);
        f.lifecycle.handle_engine_event(generation, EngineEvent::StyleLoad);
        assert_eq!(f.sync.sync(&fence(50.0), &mut f.lifecycle), SyncOutcome::Drawn);

        assert!(f.scheduler.is_cancelled(token));
        assert!(!f.sync.has_pending_retry());
        assert!(!f.sync.take_due_retry(token));
    }

    #[test]
    fn test_due_retry_matches_token() {
        let mut f = fixture();
        f.lifecycle.start();
        f.sync.sync(&fence(50.0), &mut f.lifecycle);
        let token = f.scheduler.pending()[0];

        assert!(!f.sync.take_due_retry(TimerToken::new(TimerKind::SyncRetry, 999)));
        assert!(f.sync.take_due_retry(token));
        assert!(!f.sync.has_pending_retry());
        assert!(!f.sync.take_due_retry(token));
    }

    #[test]
    fn test_invalid_geometry_keeps_previous_boundary() {
        let mut f = fixture();
        make_ready(&mut f.lifecycle);
        f.sync.sync(&fence(50.0), &mut f.lifecycle);
        let before = f.sync.handle().cloned();
        let mutations = f.recorder.mutation_count();

        let polar = GeofenceConfig::new(Location::new(90.0, 0.0), 50.0);
        assert!(matches!(
            f.sync.sync(&polar, &mut f.lifecycle),
            SyncOutcome::KeptPrevious(GeometryError::TooCloseToPole { .. })
        ));
        assert_eq!(f.sync.handle().cloned(), before);
        assert_eq!(f.recorder.mutation_count(), mutations);
        assert_eq!(f.recorder.live_layer_count(), 2);
    }

    #[test]
    fn test_error_state_does_not_schedule_retries() {
        let config = EditorConfig::default();
        let scheduler = ManualScheduler::new();
        let mut lifecycle = MapLifecycleController::new(
            &config,
            config.map.default_center,
            Box::new(HeadlessEngineFactory::default()),
            Arc::new(scheduler.clone()),
        );
        let mut sync = LayerSyncManager::new(&config, Arc::new(scheduler.clone()));
        lifecycle.start();
        assert!(lifecycle.state().is_error());

        assert_eq!(
            sync.sync(&fence(50.0), &mut lifecycle),
            SyncOutcome::Deferred {
                retry_scheduled: false
            }
        );
        assert_eq!(scheduler.scheduled_count(), 0);
    }

    #[test]
    fn test_handles_from_previous_engine_are_forgotten() {
        let mut f = fixture();
        make_ready(&mut f.lifecycle);
        f.sync.sync(&fence(50.0), &mut f.lifecycle);

        let generation = f.lifecycle.generation();
        f.lifecycle
            .handle_engine_event(generation, EngineEvent::Error("context lost".to_string()));
        f.lifecycle.retry();
        let generation = f.lifecycle.generation();
        f.lifecycle.handle_engine_event(generation, EngineEvent::Load);
        f.lifecycle.handle_engine_event(generation, EngineEvent::StyleLoad);
        f.recorder.clear_calls();

        assert_eq!(f.sync.sync(&fence(50.0), &mut f.lifecycle), SyncOutcome::Drawn);
        assert!(!f
            .recorder
            .calls()
            .iter()
            .any(|c| matches!(c, EngineCall::RemoveLayer(_))));
        assert_eq!(f.sync.handle().unwrap().generation, generation);
        assert_eq!(f.recorder.live_layer_count(), 2);
    }

    #[test]
    fn test_disposed_manager_never_touches_map() {
        let mut f = fixture();
        f.lifecycle.start();
        f.sync.sync(&fence(50.0), &mut f.lifecycle);
        let token = f.scheduler.pending()[0];

        f.sync.dispose();
        assert!(f.scheduler.is_cancelled(token));
        assert!(!f.sync.take_due_retry(token));

        let generation = f.lifecycle.generation();
        f.lifecycle.handle_engine_event(generation, EngineEvent::Load);
        f.lifecycle.handle_engine_event(generation, EngineEvent::StyleLoad);
        assert_eq!(f.sync.sync(&fence(50.0), &mut f.lifecycle), SyncOutcome::Skipped);
        assert_eq!(f.recorder.mutation_count(), 0);
    }

    /// Accepts sources and fill layers, rejects line layers and cannot
    /// remove a layer once it exists.
    #[derive(Default)]
    struct LineRejectingEngine {
        layers: Vec<String>,
    }

    impl MapEngine for LineRejectingEngine {
        fn add_source(&mut self, _source: SourceSpec) -> Result<(), EngineError> {
            Ok(())
        }

        fn remove_source(&mut self, _id: &str) -> Result<(), EngineError> {
            Ok(())
        }

        fn add_layer(&mut self, layer: LayerSpec) -> Result<(), EngineError> {
            match layer.paint {
                LayerPaint::Line { .. } => {
                    Err(EngineError::Runtime("layer limit reached".to_string()))
                }
                LayerPaint::Fill { .. } => {
                    self.layers.push(layer.id);
                    Ok(())
                }
            }
        }

        fn remove_layer(&mut self, id: &str) -> Result<(), EngineError> {
            if self.layers.iter().any(|layer| layer == id) {
                Err(EngineError::Runtime("engine busy".to_string()))
            } else {
                Err(EngineError::not_found("layer", id))
            }
        }

        fn add_marker(&mut self, _marker: MarkerSpec) -> Result<MarkerId, EngineError> {
            Ok(MarkerId(1))
        }

        fn remove_marker(&mut self, _id: MarkerId) -> Result<(), EngineError> {
            Ok(())
        }

        fn fly_to(&mut self, _center: Location, _zoom: f64) {}

        fn destroy(&mut self) {}
    }

    struct LineRejectingFactory;

    impl EngineFactory for LineRejectingFactory {
        fn construct(
            &mut self,
            _options: &EngineOptions,
        ) -> Result<Box<dyn MapEngine>, EngineError> {
            Ok(Box::new(LineRejectingEngine::default()))
        }
    }

    #[test]
    fn test_failed_rollback_counts_cleanup_failures() {
        let config = EditorConfig::default().with_access_token("pk.test");
        let scheduler = ManualScheduler::new();
        let mut lifecycle = MapLifecycleController::new(
            &config,
            config.map.default_center,
            Box::new(LineRejectingFactory),
            Arc::new(scheduler.clone()),
        );
        let mut sync = LayerSyncManager::new(&config, Arc::new(scheduler));
        make_ready(&mut lifecycle);

        assert_eq!(
            sync.sync(&fence(50.0), &mut lifecycle),
            SyncOutcome::Failed(EngineError::Runtime("layer limit reached".to_string()))
        );
        // The never-added stroke is "not found"; only the stuck fill counts
        assert_eq!(sync.stats().cleanup_failures, 1);
        assert!(sync.handle().is_none());
    }

    #[test]
    fn test_recenter_flies_to_center() {
        let mut f = fixture();
        make_ready(&mut f.lifecycle);
        f.sync.sync(&fence(50.0), &mut f.lifecycle);
        assert!(f.recorder.calls().contains(&EngineCall::FlyTo {
            center: Location::new(28.6139, 77.2090),
            zoom: 15.0,
        }));
    }
}
