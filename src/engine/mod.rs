//! Map engine boundary
//!
//! The editor never renders anything itself. It drives an external map engine
//! through the [`MapEngine`] trait and receives the engine's asynchronous
//! notifications as [`EngineEvent`]s tagged with the generation of the instance
//! that produced them.

pub mod headless;

use serde::{Deserialize, Serialize};

use crate::core::geo::Location;

/// Monotonic counter identifying one constructed engine instance.
pub type EngineGeneration = u64;

/// Notifications emitted by an engine instance
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The instance is constructed and the first tiles are in
    Load,
    /// Style and assets are loaded; layers may be mutated from now on
    StyleLoad,
    /// Runtime failure reported by the engine
    Error(String),
}

/// Failures reported by the engine boundary
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} '{id}' already exists")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("engine construction failed: {0}")]
    Construction(String),

    #[error("engine error: {0}")]
    Runtime(String),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Cleanup treats missing layers, sources and markers as already removed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Everything needed to construct an engine instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub generation: EngineGeneration,
    pub container_id: String,
    pub style_url: String,
    pub access_token: String,
    pub center: Location,
    pub zoom: f64,
}

/// GeoJSON source backing the boundary layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub id: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerPaint {
    Fill { color: String, opacity: f32 },
    Line { color: String, width: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub paint: LayerPaint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub position: Location,
    pub color: String,
}

/// Engine-assigned marker identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerId(pub u64);

impl std::fmt::Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "marker-{}", self.0)
    }
}

/// A live map engine instance.
///
/// Implementations wrap the actual rendering library. Calls are only issued
/// once the instance has reported [`EngineEvent::StyleLoad`].
pub trait MapEngine: Send {
    fn add_source(&mut self, source: SourceSpec) -> Result<(), EngineError>;
    fn remove_source(&mut self, id: &str) -> Result<(), EngineError>;
    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), EngineError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), EngineError>;
    fn add_marker(&mut self, marker: MarkerSpec) -> Result<MarkerId, EngineError>;
    fn remove_marker(&mut self, id: MarkerId) -> Result<(), EngineError>;
    fn fly_to(&mut self, center: Location, zoom: f64);

    /// Releases the underlying instance. Called exactly once by the owner.
    fn destroy(&mut self);
}

/// Constructs engine instances. Implementations are expected to report
/// `Load`, `StyleLoad` and `Error` for the instance tagged with
/// `options.generation` through the editor's event channel.
pub trait EngineFactory: Send {
    fn construct(&mut self, options: &EngineOptions) -> Result<Box<dyn MapEngine>, EngineError>;
}
