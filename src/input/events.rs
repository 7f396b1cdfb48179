use crate::{
    core::geo::Location,
    engine::{EngineEvent, EngineGeneration},
    input::geolocation::LocationError,
};

/// Channel on which engines, timers, location requests and UI code post
/// events for an editor session.
pub type EventSender = tokio::sync::mpsc::UnboundedSender<EditorEvent>;
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<EditorEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// What a timer was armed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Deferred boundary redraw
    SyncRetry,
    /// Deadline for the map style to finish loading
    BringUpTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    pub kind: TimerKind,
    pub id: u64,
}

impl TimerToken {
    pub fn new(kind: TimerKind, id: u64) -> Self {
        Self { kind, id }
    }
}

/// Why the current location was asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationRequest {
    /// Seeding the center when the session opened without one
    AutoSeed,
    /// The user pressed "use current location"
    Explicit,
}

/// Everything that can happen to an editor session
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// Notification from the engine instance with the given generation
    Engine {
        generation: EngineGeneration,
        event: EngineEvent,
    },
    /// Click on the map
    MapClick(Location),
    /// Slider or numeric radius input
    RadiusInput(f64),
    /// A scheduled timer elapsed
    Timer(TimerToken),
    /// A geolocation request completed
    LocationResolved {
        request: LocationRequest,
        result: Result<Location, LocationError>,
    },
    UseCurrentLocation,
    /// Access credential supplied after a `MissingCredential` failure
    SetCredential(String),
    RetryMap,
    Confirm,
    Cancel,
}
