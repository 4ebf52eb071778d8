use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Mapping from detector image coordinates to live viewport coordinates.
///
/// The remote detector works on frames streamed at a fixed reference
/// resolution, independent of the display the raycasts run against, so the
/// two can differ freely.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DetectorViewport {
    /// Width of the detector's reference image space, pixels.
    pub reference_width: f32,
    /// Height of the detector's reference image space, pixels.
    pub reference_height: f32,
    /// Width of the live viewport raycasts are issued in.
    pub viewport_width: f32,
    /// Height of the live viewport raycasts are issued in.
    pub viewport_height: f32,
}

impl Default for DetectorViewport {
    fn default() -> Self {
        Self {
            reference_width: 296.0,
            reference_height: 640.0,
            viewport_width: 296.0,
            viewport_height: 640.0,
        }
    }
}

impl DetectorViewport {
    /// Rescale a detector-space point into the live viewport.
    #[inline]
    pub fn to_viewport(&self, point: Point2<f32>) -> Point2<f32> {
        Point2::new(
            point.x / self.reference_width * self.viewport_width,
            point.y / self.reference_height * self.viewport_height,
        )
    }

    /// Replace the live viewport size, keeping the detector reference.
    pub fn with_viewport_size(self, width: f32, height: f32) -> Self {
        Self {
            viewport_width: width,
            viewport_height: height,
            ..self
        }
    }
}
