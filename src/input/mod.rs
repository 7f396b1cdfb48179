pub mod events;
pub mod geolocation;

// Re-export the essential types
pub use events::{EditorEvent, EventReceiver, EventSender, LocationRequest, TimerKind, TimerToken};
pub use geolocation::{GeolocationProvider, LocationError, PositionOptions, PositionSource};
