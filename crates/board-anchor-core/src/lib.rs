//! Core types and geometry for anchored-board calibration.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any transport, camera, or scene-graph facility.

mod address;
mod logger;
mod pose;
mod resolve;

pub use address::{AddressError, BoardAddress, GRID_FILES, GRID_RANKS};
pub use logger::init_with_level;
pub use pose::{
    derive_pose, BoardPose, ManualOffset, PoseError, PoseEstimator, PoseParams, WorldQuad,
};
pub use resolve::{CornerLabel, CornerQuad};
