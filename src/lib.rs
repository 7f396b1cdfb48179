//! # geofence-editor
//!
//! An interactive editor for circular geofences drawn over an external map
//! engine.
//!
//! The editor owns a single selection (center plus radius), keeps the map's
//! boundary layers in step with it, survives engine failures with a retryable
//! lifecycle, and hands the final [`GeofenceConfig`] to the caller on confirm.

pub mod core;
pub mod editor;
pub mod engine;
pub mod input;
pub mod layers;
pub mod prelude;
pub mod runtime;
pub mod spatial;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::EditorConfig,
    geo::{BoundaryPolygon, GeofenceConfig, Location},
    lifecycle::{LifecycleError, MapLifecycleController, MapLifecycleState},
};

pub use editor::{
    EditorCallbacks, EditorOptions, EditorSession, EditorStatus, GeofenceEditor, SessionHandle,
    SessionOutcome,
};

pub use engine::{EngineError, EngineEvent, EngineFactory, MapEngine};

pub use input::{
    events::EditorEvent,
    geolocation::{GeolocationProvider, LocationError, PositionSource},
};

pub use layers::sync::{LayerSyncManager, SyncOutcome};

pub use spatial::circle::{approximate_circle, CircleApproximator, GeometryError};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, EditorError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Map error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("no center selected")]
    NoSelection,

    #[error("current location is unavailable")]
    LocationDisabled,

    #[error("editor session is closed")]
    SessionClosed,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error type alias for convenience
pub type Error = EditorError;

/// Installs `env_logger` as the `log` backend, honouring `RUST_LOG`.
/// Safe to call more than once.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
