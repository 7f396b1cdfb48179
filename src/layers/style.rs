use serde::{Deserialize, Serialize};

/// Serializable RGBA color handed to the map engine as a CSS color string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// `#rrggbb` form, alpha is carried separately as an opacity.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Style for the drawn geofence boundary and its center marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryStyle {
    /// Fill color
    pub fill_color: Color,
    /// Fill opacity (0.0 to 1.0)
    pub fill_opacity: f32,
    /// Border color
    pub stroke_color: Color,
    /// Border width in pixels
    pub stroke_width: f32,
    /// Center marker color
    pub marker_color: Color,
}

impl Default for BoundaryStyle {
    fn default() -> Self {
        Self {
            fill_color: Color::rgb(59, 130, 246),
            fill_opacity: 0.2,
            stroke_color: Color::rgb(37, 99, 235),
            stroke_width: 2.0,
            marker_color: Color::rgb(239, 68, 68),
        }
    }
}
