//! Circle approximation for geofence boundaries.
//!
//! The ring is built with a local equirectangular approximation: one degree of
//! latitude is taken as a fixed number of meters and longitude degrees shrink
//! with the cosine of the center latitude. The error grows with the radius and
//! towards the poles; the editor bounds the radius to about a kilometer, where
//! the approximation is well below a meter off.

use std::f64::consts::PI;

use crate::core::{
    constants::{DEFAULT_POLE_EPSILON_DEGREES, DEFAULT_SEGMENTS, METERS_PER_DEGREE, MIN_SEGMENTS},
    geo::{BoundaryPolygon, GeofenceConfig, Location},
};

/// Reasons a boundary cannot be computed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("radius must be a positive finite number of meters, got {0}")]
    InvalidRadius(f64),

    #[error("at least {min} segments are required, got {got}")]
    TooFewSegments { got: u32, min: u32 },

    #[error("center ({lat}, {lng}) is out of range")]
    InvalidCenter { lat: f64, lng: f64 },

    #[error("center latitude {lat} is too close to a pole")]
    TooCloseToPole { lat: f64 },
}

/// Builds boundary rings for a fixed segment count and pole guard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleApproximator {
    segments: u32,
    pole_epsilon_degrees: f64,
}

impl CircleApproximator {
    pub fn new(segments: u32, pole_epsilon_degrees: f64) -> Self {
        Self {
            segments,
            pole_epsilon_degrees,
        }
    }

    pub fn segments(&self) -> u32 {
        self.segments
    }

    pub fn approximate(&self, config: &GeofenceConfig) -> Result<BoundaryPolygon, GeometryError> {
        approximate_circle_with_epsilon(
            config.center,
            config.radius_meters,
            self.segments,
            self.pole_epsilon_degrees,
        )
    }
}

impl Default for CircleApproximator {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENTS, DEFAULT_POLE_EPSILON_DEGREES)
    }
}

/// Approximates a circle of `radius_meters` around `center` with `segments`
/// points plus a closing point.
pub fn approximate_circle(
    center: Location,
    radius_meters: f64,
    segments: u32,
) -> Result<BoundaryPolygon, GeometryError> {
    approximate_circle_with_epsilon(center, radius_meters, segments, DEFAULT_POLE_EPSILON_DEGREES)
}

pub fn approximate_circle_with_epsilon(
    center: Location,
    radius_meters: f64,
    segments: u32,
    pole_epsilon_degrees: f64,
) -> Result<BoundaryPolygon, GeometryError> {
    if !radius_meters.is_finite() || radius_meters <= 0.0 {
        return Err(GeometryError::InvalidRadius(radius_meters));
    }
    if segments < MIN_SEGMENTS {
        return Err(GeometryError::TooFewSegments {
            got: segments,
            min: MIN_SEGMENTS,
        });
    }
    if !center.is_valid() || !center.lat.is_finite() || !center.lng.is_finite() {
        return Err(GeometryError::InvalidCenter {
            lat: center.lat,
            lng: center.lng,
        });
    }
    if 90.0 - center.lat.abs() <= pole_epsilon_degrees {
        return Err(GeometryError::TooCloseToPole { lat: center.lat });
    }

    let lng_scale = METERS_PER_DEGREE * (center.lat * PI / 180.0).cos();
    let mut ring = Vec::with_capacity(segments as usize + 1);

    for i in 0..segments {
        let theta = 2.0 * PI * f64::from(i) / f64::from(segments);
        let dx = radius_meters * theta.cos();
        let dy = radius_meters * theta.sin();
        ring.push(Location::new(
            center.lat + dy / METERS_PER_DEGREE,
            center.lng + dx / lng_scale,
        ));
    }
    ring.push(ring[0]);

    Ok(BoundaryPolygon::from_closed_ring(ring))
}
