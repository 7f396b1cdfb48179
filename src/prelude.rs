//! Prelude module for common geofence editor types and traits
//!
//! `use geofence_editor::prelude::*;` pulls in what a host application needs
//! to open and drive an editing session.

pub use crate::core::{
    config::{
        BoundaryDetail, EditorConfig, GeolocationConfig, GeometryConfig, MapViewConfig,
        RadiusLimits, SyncConfig,
    },
    geo::{BoundaryPolygon, GeofenceConfig, Location},
    lifecycle::{LifecycleError, MapLifecycleController, MapLifecycleState},
};

pub use crate::editor::{
    EditorCallbacks, EditorDeps, EditorOptions, EditorSession, EditorStatus, GeofenceEditor,
    LocationAvailability, SessionHandle, SessionOutcome,
};

pub use crate::engine::{
    headless::{EngineCall, EngineRecorder, HeadlessEngine, HeadlessEngineFactory},
    EngineError, EngineEvent, EngineFactory, EngineOptions, LayerPaint, LayerSpec, MapEngine,
    MarkerId, MarkerSpec, SourceSpec,
};

pub use crate::input::{
    events::{event_channel, EditorEvent, EventSender, LocationRequest, TimerKind, TimerToken},
    geolocation::{
        FixedPosition, GeolocationProvider, LocationError, PositionOptions, PositionSource,
    },
};

pub use crate::layers::{
    style::{BoundaryStyle, Color},
    sync::{DrawnLayerHandle, LayerSyncManager, SyncOutcome, SyncStats},
};

pub use crate::spatial::circle::{approximate_circle, CircleApproximator, GeometryError};

pub use crate::runtime::{
    runtime, spawn, AsyncHandle, AsyncSpawner, ChannelTimer, ManualScheduler, TimerScheduler,
};

pub use crate::{Error as EditorError, Result};

pub use std::{sync::Arc, time::Duration};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
