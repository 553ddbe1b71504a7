//! Camera module
//!
//! Fly-through camera producing the view, projection and
//! projection-to-world matrices consumed by the ray generation shader.

mod camera;

pub use camera::{Camera, DEFAULT_ASPECT_RATIO};
