//! Back-projection of labeled 2D detections into world space.
//!
//! The detector reports corners at a fixed reference resolution; this crate
//! rescales them to the live viewport and casts them against the tracked
//! surfaces supplied by the environment-tracking collaborator.

mod project;
mod viewport;

pub use project::{project_quad, ProjectedQuad, SurfaceHit, SurfaceId, SurfaceTracker, WorldPoint};
pub use viewport::DetectorViewport;
