//! Core constants for the geofence editor.
//! Keeping them in a single place makes it easier to tweak editor-wide magic numbers.

/// Meters per degree of latitude used by the equirectangular approximation.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Mean earth radius used for great-circle distances.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Smallest radius the editor accepts, in meters.
pub const DEFAULT_MIN_RADIUS_METERS: f64 = 5.0;

/// Largest radius the editor accepts, in meters.
pub const DEFAULT_MAX_RADIUS_METERS: f64 = 1000.0;

/// Radius used when the caller does not provide one.
pub const DEFAULT_RADIUS_METERS: f64 = 50.0;

/// Number of ring segments for the standard boundary detail.
pub const DEFAULT_SEGMENTS: u32 = 64;

/// Fewer segments than this produce a visibly polygonal fence.
pub const MIN_SEGMENTS: u32 = 8;

/// Latitudes within this many degrees of a pole are rejected.
pub const DEFAULT_POLE_EPSILON_DEGREES: f64 = 0.01;

/// Delay before a deferred sync is retried.
pub const DEFAULT_SYNC_RETRY_BACKOFF_MS: u64 = 500;

/// Zoom the map is constructed with and flown to on recenter.
pub const DEFAULT_ZOOM: f64 = 15.0;

/// Default single-shot geolocation timeout.
pub const DEFAULT_LOCATION_TIMEOUT_MS: u64 = 10_000;

/// Environment variable holding the map access credential.
pub const CREDENTIAL_ENV_VAR: &str = "GEOFENCE_MAP_TOKEN";

/// Source and layer id prefixes for the drawn boundary.
pub const BOUNDARY_SOURCE_PREFIX: &str = "geofence-boundary";
pub const BOUNDARY_FILL_PREFIX: &str = "geofence-fill";
pub const BOUNDARY_STROKE_PREFIX: &str = "geofence-stroke";
