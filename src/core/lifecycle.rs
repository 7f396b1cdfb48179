//! Map engine lifecycle
//!
//! [`MapLifecycleController`] exclusively owns the engine instance and walks it
//! through an explicit state machine:
//!
//! ```text
//! Uninitialized -> Initializing -> TilesLoaded -> StyleReady
//!        \              |               |             |
//!         `-----------> Error <---------+-------------'
//!                         `--- retry() --> Initializing
//! any state -> Disposed (terminal)
//! ```
//!
//! Every constructed instance gets a new generation. Engine events carry the
//! generation of the instance that emitted them, so callbacks arriving from a
//! torn-down or replaced instance are dropped instead of unregistered.

use std::{sync::Arc, time::Duration};

use crate::{
    core::{config::EditorConfig, config::MapViewConfig, geo::Location},
    engine::{EngineError, EngineEvent, EngineFactory, EngineGeneration, EngineOptions, MapEngine},
    input::events::{TimerKind, TimerToken},
    runtime::{AsyncHandle, TimerScheduler},
};

/// Why the map is in the `Error` state
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("map access credential is not configured")]
    MissingCredential,

    #[error("map engine could not be constructed: {0}")]
    EngineConstructionFailed(String),

    #[error("map engine reported an error: {0}")]
    EngineRuntimeError(String),

    #[error("map style did not load within {0:?}")]
    BringUpTimeout(Duration),
}

impl LifecycleError {
    /// `MissingCredential` needs a credential from the caller before a retry can help.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::MissingCredential)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapLifecycleState {
    Uninitialized,
    Initializing,
    TilesLoaded,
    StyleReady,
    Error(LifecycleError),
    Disposed,
}

impl MapLifecycleState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::StyleReady)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    fn is_bringing_up(&self) -> bool {
        matches!(self, Self::Initializing | Self::TilesLoaded)
    }
}

impl std::fmt::Display for MapLifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::TilesLoaded => write!(f, "tiles-loaded"),
            Self::StyleReady => write!(f, "style-ready"),
            Self::Error(cause) => write!(f, "error ({cause})"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

pub type ReadyCallback = Box<dyn FnOnce() + Send>;
pub type ErrorCallback = Box<dyn FnMut(&LifecycleError) + Send>;

pub struct MapLifecycleController {
    state: MapLifecycleState,
    engine: Option<Box<dyn MapEngine>>,
    factory: Box<dyn EngineFactory>,
    view: MapViewConfig,
    access_token: Option<String>,
    center: Location,
    generation: EngineGeneration,
    /// `style.load` seen before `load` for the current generation
    style_loaded_early: bool,
    scheduler: Arc<dyn TimerScheduler>,
    bring_up_timeout: Option<Duration>,
    bring_up_timer: Option<Box<dyn AsyncHandle>>,
    ready_fired: bool,
    on_ready: Vec<ReadyCallback>,
    on_error: Vec<ErrorCallback>,
}

impl MapLifecycleController {
    pub fn new(
        config: &EditorConfig,
        center: Location,
        factory: Box<dyn EngineFactory>,
        scheduler: Arc<dyn TimerScheduler>,
    ) -> Self {
        Self {
            state: MapLifecycleState::Uninitialized,
            engine: None,
            factory,
            view: config.map.clone(),
            access_token: config.access_token.clone(),
            center,
            generation: 0,
            style_loaded_early: false,
            scheduler,
            bring_up_timeout: config.sync.bring_up_timeout(),
            bring_up_timer: None,
            ready_fired: false,
            on_ready: Vec::new(),
            on_error: Vec::new(),
        }
    }

    pub fn state(&self) -> &MapLifecycleState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    pub fn is_disposed(&self) -> bool {
        self.state == MapLifecycleState::Disposed
    }

    /// Generation of the most recently constructed engine instance.
    pub fn generation(&self) -> EngineGeneration {
        self.generation
    }

    /// The engine, but only while layers may be mutated.
    pub fn engine_mut(&mut self) -> Option<&mut (dyn MapEngine + 'static)> {
        if self.state.is_ready() {
            self.engine.as_deref_mut()
        } else {
            None
        }
    }

    /// Registers a callback for the first time the map becomes style-ready.
    /// Runs immediately if that already happened.
    pub fn on_ready(&mut self, callback: impl FnOnce() + Send + 'static) {
        if self.ready_fired {
            callback();
        } else {
            self.on_ready.push(Box::new(callback));
        }
    }

    /// Registers a callback for every entry into the error state.
    pub fn on_error(&mut self, callback: impl FnMut(&LifecycleError) + Send + 'static) {
        self.on_error.push(Box::new(callback));
    }

    pub fn set_credential(&mut self, token: impl Into<String>) {
        self.access_token = Some(token.into());
    }

    /// Position the next construction opens at.
    pub fn set_center(&mut self, center: Location) {
        self.center = center;
    }

    pub fn start(&mut self) {
        if self.state != MapLifecycleState::Uninitialized {
            log::debug!("map lifecycle already started ({})", self.state);
            return;
        }
        self.construct();
    }

    /// Rebuilds the engine after an error. Does nothing in any other state.
    pub fn retry(&mut self) {
        if !self.state.is_error() {
            log::debug!("retry ignored, map lifecycle is {}", self.state);
            return;
        }
        self.release_engine();
        self.construct();
    }

    /// Applies an engine notification. Returns the new state when it changed.
    pub fn handle_engine_event(
        &mut self,
        generation: EngineGeneration,
        event: EngineEvent,
    ) -> Option<MapLifecycleState> {
        if self.is_disposed() || generation != self.generation || self.engine.is_none() {
            log::debug!(
                "dropping {:?} from engine {} (current {}, {})",
                event,
                generation,
                self.generation,
                self.state
            );
            return None;
        }

        match (event, self.state.clone()) {
            (EngineEvent::Load, MapLifecycleState::Initializing) => {
                self.transition(MapLifecycleState::TilesLoaded);
                if self.style_loaded_early {
                    self.enter_ready();
                }
            }
            (EngineEvent::StyleLoad, MapLifecycleState::TilesLoaded) => self.enter_ready(),
            (EngineEvent::StyleLoad, MapLifecycleState::Initializing) => {
                self.style_loaded_early = true;
                return None;
            }
            (EngineEvent::Error(message), state) if !state.is_error() => {
                self.enter_error(LifecycleError::EngineRuntimeError(message));
            }
            (event, state) => {
                log::debug!("ignoring {:?} while {}", event, state);
                return None;
            }
        }
        Some(self.state.clone())
    }

    /// Handles an elapsed bring-up deadline. Returns true if it moved the map
    /// into the error state.
    pub fn handle_timer(&mut self, token: TimerToken) -> bool {
        if token.kind != TimerKind::BringUpTimeout || token.id != self.generation {
            return false;
        }
        self.bring_up_timer = None;
        match (self.state.is_bringing_up(), self.bring_up_timeout) {
            (true, Some(timeout)) => {
                self.enter_error(LifecycleError::BringUpTimeout(timeout));
                true
            }
            _ => false,
        }
    }

    /// Tears the map down. Idempotent.
    pub fn dispose(&mut self) {
        if self.is_disposed() {
            return;
        }
        self.release_engine();
        self.state = MapLifecycleState::Disposed;
        self.on_ready.clear();
        self.on_error.clear();
        log::debug!("map lifecycle disposed");
    }

    fn construct(&mut self) {
        self.generation += 1;
        self.style_loaded_early = false;
        self.transition(MapLifecycleState::Initializing);

        let access_token = match self.access_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                self.enter_error(LifecycleError::MissingCredential);
                return;
            }
        };

        let options = EngineOptions {
            generation: self.generation,
            container_id: self.view.container_id.clone(),
            style_url: self.view.style_url.clone(),
            access_token,
            center: self.center,
            zoom: self.view.zoom,
        };

        match self.factory.construct(&options) {
            Ok(engine) => {
                self.engine = Some(engine);
                if let Some(timeout) = self.bring_up_timeout {
                    let token = TimerToken::new(TimerKind::BringUpTimeout, self.generation);
                    self.bring_up_timer = Some(self.scheduler.schedule(timeout, token));
                }
            }
            Err(err) => {
                let message = match err {
                    EngineError::Construction(message) => message,
                    other => other.to_string(),
                };
                self.enter_error(LifecycleError::EngineConstructionFailed(message));
            }
        }
    }

    fn enter_ready(&mut self) {
        self.cancel_bring_up_timer();
        self.transition(MapLifecycleState::StyleReady);
        if !self.ready_fired {
            self.ready_fired = true;
            for callback in self.on_ready.drain(..) {
                callback();
            }
        }
    }

    fn enter_error(&mut self, cause: LifecycleError) {
        self.cancel_bring_up_timer();
        log::warn!("map lifecycle error: {}", cause);
        self.transition(MapLifecycleState::Error(cause.clone()));
        for callback in self.on_error.iter_mut() {
            callback(&cause);
        }
    }

    fn transition(&mut self, next: MapLifecycleState) {
        log::debug!("map lifecycle {} -> {}", self.state, next);
        self.state = next;
    }

    fn cancel_bring_up_timer(&mut self) {
        if let Some(timer) = self.bring_up_timer.take() {
            timer.cancel();
        }
    }

    fn release_engine(&mut self) {
        self.cancel_bring_up_timer();
        if let Some(mut engine) = self.engine.take() {
            engine.destroy();
        }
    }
}

impl Drop for MapLifecycleController {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for MapLifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapLifecycleController")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("has_engine", &self.engine.is_some())
            .finish_non_exhaustive()
    }
}
