//! Single-shot geolocation.
//!
//! [`GeolocationProvider`] asks a platform [`PositionSource`] for one position
//! sample and enforces the configured timeout. It never watches the position
//! continuously and knows nothing about the map.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::core::{config::GeolocationConfig, geo::Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable")]
    Unavailable,

    #[error("location request timed out")]
    Timeout,
}

impl LocationError {
    /// Maps a W3C `GeolocationPositionError` code.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::PermissionDenied,
            3 => Self::Timeout,
            _ => Self::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl From<&GeolocationConfig> for PositionOptions {
    fn from(config: &GeolocationConfig) -> Self {
        Self {
            enable_high_accuracy: config.high_accuracy,
            timeout: config.timeout(),
            maximum_age: Duration::from_millis(config.maximum_age_ms),
        }
    }
}

impl Default for PositionOptions {
    fn default() -> Self {
        (&GeolocationConfig::default()).into()
    }
}

/// Platform location API
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self, options: &PositionOptions) -> Result<Location, LocationError>;
}

/// A source that always answers with the same result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPosition(pub Result<Location, LocationError>);

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Location, LocationError> {
        self.0
    }
}

#[derive(Clone)]
pub struct GeolocationProvider {
    source: Arc<dyn PositionSource>,
    options: PositionOptions,
}

impl GeolocationProvider {
    pub fn new(source: Arc<dyn PositionSource>, options: PositionOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &PositionOptions {
        &self.options
    }

    pub async fn request_current_location(&self) -> Result<Location, LocationError> {
        let request = self.source.current_position(&self.options);
        match tokio::time::timeout(self.options.timeout, request).await {
            Ok(Ok(location)) if location.is_valid() => Ok(location),
            Ok(Ok(location)) => {
                log::warn!("position source returned out-of-range location {:?}", location);
                Err(LocationError::Unavailable)
            }
            Ok(Err(error)) => Err(error),
            Err(_) => Err(LocationError::Timeout),
        }
    }
}

impl std::fmt::Debug for GeolocationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeolocationProvider")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
