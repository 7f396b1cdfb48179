pub mod circle;

pub use circle::{approximate_circle, CircleApproximator, GeometryError};
