//! In-memory engine used for headless sessions and tests.
//!
//! Every call is recorded in an [`EngineRecorder`] shared with the caller, so
//! the order of removals and additions can be inspected after the fact.

use std::sync::{Arc, Mutex};

use crate::{
    core::geo::Location,
    engine::{
        EngineError, EngineEvent, EngineFactory, EngineGeneration, EngineOptions, LayerSpec,
        MapEngine, MarkerId, MarkerSpec, SourceSpec,
    },
    input::events::{EditorEvent, EventSender},
    prelude::{HashMap, HashSet},
};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Construct { generation: EngineGeneration },
    AddSource(String),
    RemoveSource(String),
    AddLayer(String),
    RemoveLayer(String),
    AddMarker(Location),
    RemoveMarker(MarkerId),
    FlyTo { center: Location, zoom: f64 },
    Destroy { generation: EngineGeneration },
}

impl EngineCall {
    /// Calls that change drawable map content.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::AddSource(_)
                | Self::RemoveSource(_)
                | Self::AddLayer(_)
                | Self::RemoveLayer(_)
                | Self::AddMarker(_)
                | Self::RemoveMarker(_)
        )
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    calls: Vec<EngineCall>,
    live_layers: HashSet<String>,
    live_sources: HashSet<String>,
    live_markers: HashSet<MarkerId>,
}

/// Shared log of engine calls across all instances built by one factory
#[derive(Debug, Clone, Default)]
pub struct EngineRecorder(Arc<Mutex<RecorderState>>);

impl EngineRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut RecorderState) -> R) -> Option<R> {
        self.0.lock().ok().map(|mut state| f(&mut state))
    }

    fn record(&self, call: EngineCall) {
        self.with_state(|state| state.calls.push(call));
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.with_state(|state| state.calls.clone()).unwrap_or_default()
    }

    pub fn mutation_count(&self) -> usize {
        self.with_state(|state| state.calls.iter().filter(|c| c.is_mutation()).count())
            .unwrap_or(0)
    }

    pub fn live_layer_count(&self) -> usize {
        self.with_state(|state| state.live_layers.len()).unwrap_or(0)
    }

    pub fn live_source_count(&self) -> usize {
        self.with_state(|state| state.live_sources.len()).unwrap_or(0)
    }

    pub fn live_marker_count(&self) -> usize {
        self.with_state(|state| state.live_markers.len()).unwrap_or(0)
    }

    pub fn clear_calls(&self) {
        self.with_state(|state| state.calls.clear());
    }
}

pub struct HeadlessEngine {
    generation: EngineGeneration,
    recorder: EngineRecorder,
    sources: HashMap<String, serde_json::Value>,
    layers: HashMap<String, LayerSpec>,
    markers: HashMap<MarkerId, MarkerSpec>,
    next_marker: u64,
    destroyed: bool,
}

impl HeadlessEngine {
    pub fn new(generation: EngineGeneration, recorder: EngineRecorder) -> Self {
        recorder.record(EngineCall::Construct { generation });
        Self {
            generation,
            recorder,
            sources: HashMap::default(),
            layers: HashMap::default(),
            markers: HashMap::default(),
            next_marker: 1,
            destroyed: false,
        }
    }

    fn ensure_alive(&self) -> Result<(), EngineError> {
        if self.destroyed {
            Err(EngineError::Runtime(format!(
                "engine {} has been destroyed",
                self.generation
            )))
        } else {
            Ok(())
        }
    }
}

impl MapEngine for HeadlessEngine {
    fn add_source(&mut self, source: SourceSpec) -> Result<(), EngineError> {
        self.recorder.record(EngineCall::AddSource(source.id.clone()));
        self.ensure_alive()?;
        if self.sources.contains_key(&source.id) {
            return Err(EngineError::AlreadyExists {
                kind: "source",
                id: source.id,
            });
        }
        self.recorder
            .with_state(|state| state.live_sources.insert(source.id.clone()));
        self.sources.insert(source.id, source.data);
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), EngineError> {
        self.recorder.record(EngineCall::RemoveSource(id.to_string()));
        self.ensure_alive()?;
        if self.layers.values().any(|layer| layer.source == id) {
            return Err(EngineError::Runtime(format!(
                "source '{id}' is still used by a layer"
            )));
        }
        self.sources
            .remove(id)
            .ok_or_else(|| EngineError::not_found("source", id))?;
        self.recorder.with_state(|state| state.live_sources.remove(id));
        Ok(())
    }

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), EngineError> {
        self.recorder.record(EngineCall::AddLayer(layer.id.clone()));
        self.ensure_alive()?;
        if !self.sources.contains_key(&layer.source) {
            return Err(EngineError::not_found("source", layer.source));
        }
        if self.layers.contains_key(&layer.id) {
            return Err(EngineError::AlreadyExists {
                kind: "layer",
                id: layer.id,
            });
        }
        self.recorder
            .with_state(|state| state.live_layers.insert(layer.id.clone()));
        self.layers.insert(layer.id.clone(), layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), EngineError> {
        self.recorder.record(EngineCall::RemoveLayer(id.to_string()));
        self.ensure_alive()?;
        self.layers
            .remove(id)
            .ok_or_else(|| EngineError::not_found("layer", id))?;
        self.recorder.with_state(|state| state.live_layers.remove(id));
        Ok(())
    }

    fn add_marker(&mut self, marker: MarkerSpec) -> Result<MarkerId, EngineError> {
        self.recorder.record(EngineCall::AddMarker(marker.position));
        self.ensure_alive()?;
        let id = MarkerId(self.next_marker);
        self.next_marker += 1;
        self.markers.insert(id, marker);
        self.recorder.with_state(|state| state.live_markers.insert(id));
        Ok(id)
    }

    fn remove_marker(&mut self, id: MarkerId) -> Result<(), EngineError> {
        self.recorder.record(EngineCall::RemoveMarker(id));
        self.ensure_alive()?;
        self.markers
            .remove(&id)
            .ok_or_else(|| EngineError::not_found("marker", id.to_string()))?;
        self.recorder.with_state(|state| state.live_markers.remove(&id));
        Ok(())
    }

    fn fly_to(&mut self, center: Location, zoom: f64) {
        self.recorder.record(EngineCall::FlyTo { center, zoom });
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.recorder.record(EngineCall::Destroy {
            generation: self.generation,
        });
        self.recorder.with_state(|state| {
            for id in self.layers.keys() {
                state.live_layers.remove(id);
            }
            for id in self.sources.keys() {
                state.live_sources.remove(id);
            }
            for id in self.markers.keys() {
                state.live_markers.remove(id);
            }
        });
        self.layers.clear();
        self.sources.clear();
        self.markers.clear();
    }
}

/// Builds [`HeadlessEngine`]s. With an event sender attached, every instance
/// immediately reports `Load` and `StyleLoad`, like a real engine would once its
/// style finished loading.
#[derive(Default)]
pub struct HeadlessEngineFactory {
    recorder: EngineRecorder,
    events: Option<EventSender>,
    failures_remaining: u32,
    failure_message: String,
}

impl HeadlessEngineFactory {
    pub fn new(recorder: EngineRecorder) -> Self {
        Self {
            recorder,
            ..Default::default()
        }
    }

    /// Report bring-up events on `events` for every constructed instance.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Fail the next `attempts` constructions with `message`.
    pub fn failing(mut self, attempts: u32, message: impl Into<String>) -> Self {
        self.failures_remaining = attempts;
        self.failure_message = message.into();
        self
    }

    pub fn recorder(&self) -> &EngineRecorder {
        &self.recorder
    }
}

impl EngineFactory for HeadlessEngineFactory {
    fn construct(&mut self, options: &EngineOptions) -> Result<Box<dyn MapEngine>, EngineError> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(EngineError::Construction(self.failure_message.clone()));
        }

        let engine = HeadlessEngine::new(options.generation, self.recorder.clone());

        if let Some(events) = &self.events {
            for event in [EngineEvent::Load, EngineEvent::StyleLoad] {
                let _ = events.send(EditorEvent::Engine {
                    generation: options.generation,
                    event,
                });
            }
        }

        Ok(Box::new(engine))
    }
}
