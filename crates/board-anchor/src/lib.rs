//! High-level facade crate for the `board-anchor-*` workspace.
//!
//! This crate provides:
//! - stable, convenient re-exports of the underlying pipeline crates
//! - the calibration session that wires them together: frame producer,
//!   detector link, decoder, back-projection, pose estimation, and overlay
//!   refresh under one state machine.
//!
//! ## Quickstart
//!
//! ```no_run
//! use board_anchor::{CalibrationSession, SessionConfig};
//! # use board_anchor::track::{SurfaceHit, SurfaceTracker};
//! # use board_anchor::stream::{CameraFrame, FrameSource};
//! # use board_anchor::overlay::{MarkerColor, MarkerId, MarkerRole, MarkerScene};
//! # struct Camera;
//! # impl FrameSource for Camera {
//! #     fn try_acquire(&mut self) -> Option<CameraFrame> { None }
//! # }
//! # struct Tracking;
//! # impl SurfaceTracker for Tracking {
//! #     fn raycast(&self, _p: nalgebra::Point2<f32>) -> Option<SurfaceHit> { None }
//! #     fn tracked_surface_count(&self) -> usize { 0 }
//! # }
//! # struct Scene;
//! # impl MarkerScene for Scene {
//! #     fn spawn(&mut self, _r: MarkerRole, _c: MarkerColor, _p: nalgebra::Point3<f32>) -> MarkerId { 0 }
//! #     fn set_position(&mut self, _id: MarkerId, _p: nalgebra::Point3<f32>) {}
//! #     fn despawn(&mut self, _id: MarkerId) {}
//! # }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::default();
//! let mut session = CalibrationSession::connect(config, Camera, Tracking, Scene)?;
//! session.toggle_streaming();
//! loop {
//!     session.tick(1.0 / 60.0);
//!     if session.state() == board_anchor::CalibrationState::Located {
//!         session.place_markers("e2", "e4")?;
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `board_anchor::core`: geometry, corner labeling, board notation, poses.
//! - `board_anchor::track`: viewport rescaling and surface raycasts.
//! - `board_anchor::stream`: detector link, frame producer, wire decoding.
//! - `board_anchor::overlay`: move markers and their idle animation.

pub use board_anchor_core as core;
pub use board_anchor_overlay as overlay;
pub use board_anchor_stream as stream;
pub use board_anchor_track as track;

pub use board_anchor_core::{BoardAddress, BoardPose, CornerQuad, ManualOffset};

mod latest;
mod session;
mod state;

pub use latest::Latest;
pub use session::{CalibrationSession, SessionConfig, SessionError, SessionStatus};
pub use state::{CalibrationState, CalibrationStateMachine};
