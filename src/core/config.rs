//! Configuration system for the geofence editor
//!
//! This module provides a hierarchical configuration that callers can build in
//! code, load from JSON, or override from the environment. Boundary detail is
//! expressed as a preset profile that resolves into a concrete segment count.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    core::{constants::*, geo::Location},
    layers::style::BoundaryStyle,
    EditorError, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryDetail {
    Coarse,
    Standard,
    Fine,
    Custom(u32),
}

impl BoundaryDetail {
    /// Number of ring segments this preset stands for.
    pub fn resolve(&self) -> u32 {
        match self {
            Self::Coarse => 24,
            Self::Standard => DEFAULT_SEGMENTS,
            Self::Fine => 128,
            Self::Custom(segments) => *segments,
        }
    }
}

impl Default for BoundaryDetail {
    fn default() -> Self {
        Self::Standard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadiusLimits {
    pub min_meters: f64,
    pub max_meters: f64,
}

impl RadiusLimits {
    /// Clamps user input into the allowed range. NaN falls back to the minimum.
    pub fn clamp(&self, radius_meters: f64) -> f64 {
        if radius_meters.is_nan() {
            return self.min_meters;
        }
        radius_meters.clamp(self.min_meters, self.max_meters)
    }

    pub fn contains(&self, radius_meters: f64) -> bool {
        radius_meters >= self.min_meters && radius_meters <= self.max_meters
    }
}

impl Default for RadiusLimits {
    fn default() -> Self {
        Self {
            min_meters: DEFAULT_MIN_RADIUS_METERS,
            max_meters: DEFAULT_MAX_RADIUS_METERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapViewConfig {
    pub container_id: String,
    pub style_url: String,
    /// Where the map opens when the session has no initial center.
    pub default_center: Location,
    pub zoom: f64,
    pub recenter_on_sync: bool,
}

impl Default for MapViewConfig {
    fn default() -> Self {
        Self {
            container_id: "geofence-map".to_string(),
            style_url: "mapbox://styles/mapbox/streets-v12".to_string(),
            default_center: Location::new(28.6139, 77.2090),
            zoom: DEFAULT_ZOOM,
            recenter_on_sync: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub retry_backoff_ms: u64,
    /// `None` waits for the style indefinitely.
    pub bring_up_timeout_ms: Option<u64>,
}

impl SyncConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn bring_up_timeout(&self) -> Option<Duration> {
        self.bring_up_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: DEFAULT_SYNC_RETRY_BACKOFF_MS,
            bring_up_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub detail: BoundaryDetail,
    pub pole_epsilon_degrees: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            detail: BoundaryDetail::default(),
            pole_epsilon_degrees: DEFAULT_POLE_EPSILON_DEGREES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    pub timeout_ms: u64,
    pub high_accuracy: bool,
    pub maximum_age_ms: u64,
}

impl GeolocationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_LOCATION_TIMEOUT_MS,
            high_accuracy: true,
            maximum_age_ms: 0,
        }
    }
}

/// Complete editor configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub radius: RadiusLimits,
    pub map: MapViewConfig,
    pub sync: SyncConfig,
    pub geometry: GeometryConfig,
    pub geolocation: GeolocationConfig,
    pub style: BoundaryStyle,
    /// Map engine access credential. Never serialized back out.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
}

impl EditorConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Fills the access token from the environment when it is not set.
    pub fn with_env_overrides(mut self) -> Self {
        if self.access_token.as_deref().map_or(true, str::is_empty) {
            if let Ok(token) = std::env::var(CREDENTIAL_ENV_VAR) {
                log::debug!("access token loaded from {}", CREDENTIAL_ENV_VAR);
                self.access_token = Some(token);
            }
        }
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn segments(&self) -> u32 {
        self.geometry.detail.resolve()
    }

    pub fn validate(&self) -> Result<()> {
        let RadiusLimits {
            min_meters,
            max_meters,
        } = self.radius;
        if !(min_meters.is_finite() && max_meters.is_finite()) || min_meters <= 0.0 {
            return Err(EditorError::Config(format!(
                "radius limits must be positive and finite, got [{min_meters}, {max_meters}]"
            )));
        }
        if min_meters > max_meters {
            return Err(EditorError::Config(format!(
                "min radius {min_meters} exceeds max radius {max_meters}"
            )));
        }
        if self.segments() < MIN_SEGMENTS {
            return Err(EditorError::Config(format!(
                "boundary needs at least {MIN_SEGMENTS} segments, got {}",
                self.segments()
            )));
        }
        if !(0.0..90.0).contains(&self.geometry.pole_epsilon_degrees) {
            return Err(EditorError::Config(
                "pole epsilon must be within [0, 90) degrees".to_string(),
            ));
        }
        if !self.map.default_center.is_valid() {
            return Err(EditorError::Config(
                "default map center is out of range".to_string(),
            ));
        }
        Ok(())
    }
}
