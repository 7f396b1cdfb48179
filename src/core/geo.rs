use serde::{Deserialize, Serialize};

use crate::core::constants::{EARTH_RADIUS_METERS, METERS_PER_DEGREE};

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    /// Creates a new Location coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Calculates the distance to another Location using the Haversine formula
    pub fn distance_to(&self, other: &Location) -> f64 {
        let lat1_rad = self.lat.to_radians();
        let lat2_rad = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lng = (other.lng - self.lng).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_METERS * c
    }

    /// Distance to another point using the local equirectangular approximation
    /// centered on `self`. This is the metric the boundary ring is built with.
    pub fn equirectangular_distance_to(&self, other: &Location) -> f64 {
        let dy = (other.lat - self.lat) * METERS_PER_DEGREE;
        let dx = (other.lng - self.lng) * METERS_PER_DEGREE * self.lat.to_radians().cos();
        (dx * dx + dy * dy).sqrt()
    }

    /// Wraps longitude to [-180, 180] range
    pub fn wrap_lng(lng: f64) -> f64 {
        let wrapped = lng % 360.0;
        if wrapped > 180.0 {
            wrapped - 360.0
        } else if wrapped < -180.0 {
            wrapped + 360.0
        } else {
            wrapped
        }
    }

    /// Clamps latitude to valid range
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-90.0, 90.0)
    }

    /// Normalizes an arbitrary click position into a valid location.
    pub fn normalized(&self) -> Self {
        Self::new(Self::clamp_lat(self.lat), Self::wrap_lng(self.lng))
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl From<Location> for geo_types::Coord<f64> {
    fn from(location: Location) -> Self {
        geo_types::coord! { x: location.lng, y: location.lat }
    }
}

impl From<Location> for geo_types::Point<f64> {
    fn from(location: Location) -> Self {
        geo_types::Point::new(location.lng, location.lat)
    }
}

/// The user's current selection: a center and a radius in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceConfig {
    pub center: Location,
    pub radius_meters: f64,
}

impl GeofenceConfig {
    pub fn new(center: Location, radius_meters: f64) -> Self {
        Self {
            center,
            radius_meters,
        }
    }

    /// Whether `location` falls inside the fence (great-circle distance).
    pub fn contains(&self, location: &Location) -> bool {
        self.center.distance_to(location) <= self.radius_meters
    }
}

/// Closed ring approximating a geofence boundary. The first point is repeated
/// as the last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryPolygon {
    ring: Vec<Location>,
}

impl BoundaryPolygon {
    pub(crate) fn from_closed_ring(ring: Vec<Location>) -> Self {
        debug_assert!(ring.len() >= 2 && ring.first() == ring.last());
        Self { ring }
    }

    pub fn points(&self) -> &[Location] {
        &self.ring
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.ring.len() >= 2 && self.ring.first() == self.ring.last()
    }

    /// Point-in-polygon test against the approximated ring.
    pub fn contains(&self, location: &Location) -> bool {
        use geo::Contains;

        let polygon: geo_types::Polygon<f64> = self.into();
        polygon.contains(&geo_types::Point::from(*location))
    }

    /// GeoJSON `Feature` with a single polygon geometry, in `[lng, lat]` order.
    pub fn to_geojson(&self) -> serde_json::Value {
        let coordinates: Vec<[f64; 2]> = self.ring.iter().map(|p| [p.lng, p.lat]).collect();
        serde_json::json!({
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "Polygon",
                "coordinates": [coordinates]
            }
        })
    }
}

impl From<&BoundaryPolygon> for geo_types::Polygon<f64> {
    fn from(boundary: &BoundaryPolygon) -> Self {
        let exterior: geo_types::LineString<f64> = boundary
            .ring
            .iter()
            .map(|p| geo_types::Coord::from(*p))
            .collect();
        geo_types::Polygon::new(exterior, Vec::new())
    }
}
