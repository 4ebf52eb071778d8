use board_anchor_core::{CornerLabel, CornerQuad, WorldQuad};
use log::debug;
use nalgebra::{Point2, Point3};

use crate::viewport::DetectorViewport;

/// Identity of a tracked surface reported by the tracking collaborator.
pub type SurfaceId = u64;

/// A successful cast against a tracked surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceHit {
    pub position: Point3<f32>,
    pub surface: SurfaceId,
}

/// Environment-tracking collaborator: candidate planar surfaces and
/// viewport hit tests.
pub trait SurfaceTracker {
    /// Cast a ray from the viewpoint through a viewport point and return the
    /// nearest tracked-surface hit, if any.
    fn raycast(&self, viewport: Point2<f32>) -> Option<SurfaceHit>;

    /// Number of surfaces currently tracked.
    fn tracked_surface_count(&self) -> usize;
}

/// A corner back-projected into world space, tagged with the surface it
/// landed on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldPoint {
    pub label: CornerLabel,
    pub position: Point3<f32>,
    pub surface: SurfaceId,
}

/// Back-projection of a labeled quad. Corners whose cast missed every
/// surface are absent, not zero-filled.
#[derive(Clone, Debug, Default)]
pub struct ProjectedQuad {
    points: [Option<WorldPoint>; 4],
}

impl ProjectedQuad {
    /// The back-projected corner for a label, if its cast hit.
    #[inline]
    pub fn get(&self, label: CornerLabel) -> Option<&WorldPoint> {
        self.points[label_index(label)].as_ref()
    }

    /// How many of the four corners resolved to a surface hit.
    pub fn resolved_count(&self) -> usize {
        self.points.iter().flatten().count()
    }

    /// The complete world quad, available only when all four corners hit.
    pub fn complete(&self) -> Option<WorldQuad> {
        Some(WorldQuad {
            top_left: self.get(CornerLabel::TopLeft)?.position,
            top_right: self.get(CornerLabel::TopRight)?.position,
            bottom_left: self.get(CornerLabel::BottomLeft)?.position,
            bottom_right: self.get(CornerLabel::BottomRight)?.position,
        })
    }
}

#[inline]
fn label_index(label: CornerLabel) -> usize {
    match label {
        CornerLabel::TopLeft => 0,
        CornerLabel::TopRight => 1,
        CornerLabel::BottomLeft => 2,
        CornerLabel::BottomRight => 3,
    }
}

/// Back-project each labeled corner: rescale to the viewport and take the
/// nearest surface hit. Misses are partial results, not errors.
pub fn project_quad(
    quad: &CornerQuad,
    viewport: &DetectorViewport,
    surfaces: &impl SurfaceTracker,
) -> ProjectedQuad {
    let mut projected = ProjectedQuad::default();
    for (label, detector_point) in quad.corners() {
        let cast_point = viewport.to_viewport(detector_point);
        projected.points[label_index(label)] = surfaces.raycast(cast_point).map(|hit| WorldPoint {
            label,
            position: hit.position,
            surface: hit.surface,
        });
    }
    debug!(
        "back-projected {}/4 corners across {} tracked surfaces",
        projected.resolved_count(),
        surfaces.tracked_surface_count()
    );
    projected
}
