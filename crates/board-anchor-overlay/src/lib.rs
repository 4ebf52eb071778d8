//! Visual annotations tracking the board frame.
//!
//! Markers are addressed in board-local notation and positioned against the
//! current board pose. Whenever the pose changes they are destroyed and
//! recreated, never re-parented, so stale relative transforms cannot
//! accumulate.

mod manager;
mod marker;

pub use manager::{OverlayError, OverlayManager};
pub use marker::{MarkerAnimation, MarkerColor, MarkerId, MarkerRole, MarkerScene};
