use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Opaque handle of a spawned marker object in the scene graph.
pub type MarkerId = u64;

/// Role of a marker within a move annotation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum MarkerRole {
    From,
    To,
}

impl MarkerRole {
    /// Default tint per role; the two ends of a move stay distinguishable.
    pub fn default_color(self) -> MarkerColor {
        match self {
            MarkerRole::From => MarkerColor::rgb(0.15, 0.45, 1.0),
            MarkerRole::To => MarkerColor::rgb(0.1, 0.85, 0.3),
        }
    }
}

/// RGBA marker tint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl MarkerColor {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

/// Idle-animation tuning: a bounded vertical oscillation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MarkerAnimation {
    /// Peak displacement along the board up axis, world units.
    pub amplitude: f32,
    /// Oscillations per second.
    pub frequency: f32,
}

impl Default for MarkerAnimation {
    fn default() -> Self {
        Self {
            amplitude: 0.01,
            frequency: 1.0,
        }
    }
}

/// Scene-graph collaborator owning the visual marker objects.
pub trait MarkerScene {
    /// Create a marker object at a world position and return its handle.
    fn spawn(&mut self, role: MarkerRole, color: MarkerColor, position: Point3<f32>) -> MarkerId;

    /// Move an existing marker.
    fn set_position(&mut self, id: MarkerId, position: Point3<f32>);

    /// Destroy a marker object.
    fn despawn(&mut self, id: MarkerId);
}
