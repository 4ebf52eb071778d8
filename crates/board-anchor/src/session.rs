use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use board_anchor_core::{
    BoardPose, CornerQuad, ManualOffset, PoseEstimator, PoseParams,
};
use board_anchor_overlay::{MarkerAnimation, MarkerScene, OverlayError, OverlayManager};
use board_anchor_stream::{
    DecodeOutcome, DetectionDecoder, DetectorLink, FrameProducer, FrameSource,
    PreferredCameraConfig, TransportError, TransportEvent,
};
use board_anchor_track::{project_quad, DetectorViewport, SurfaceTracker};

use crate::latest::Latest;
use crate::state::{CalibrationState, CalibrationStateMachine};

/// Recognized configuration of a calibration session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Websocket endpoint of the remote detector.
    pub endpoint: String,
    /// Detector reference space and live viewport sizes.
    pub viewport: DetectorViewport,
    /// Seconds between streamed frames.
    pub frame_interval: f32,
    /// Idle animation of the move markers.
    pub animation: MarkerAnimation,
    /// Cells per board side.
    pub grid: u32,
    /// Pose derivation tuning.
    pub pose: PoseParams,
    /// Capture configuration the camera is asked for.
    pub camera: PreferredCameraConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://192.168.1.15:8000/stream".to_owned(),
            viewport: DetectorViewport::default(),
            frame_interval: 0.5,
            animation: MarkerAnimation::default(),
            grid: 8,
            pose: PoseParams::default(),
            camera: PreferredCameraConfig::default(),
        }
    }
}

/// Errors surfaced at the session boundary.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to start the frame producer: {0}")]
    Producer(#[from] std::io::Error),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    #[error("no board has been located yet")]
    BoardNotLocated,
}

/// Connection and decoding health, for a status line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: CalibrationState,
    pub link_faults: u32,
    pub decode_faults: u32,
    pub link_closed: bool,
    pub last_fault: Option<String>,
}

/// Wires the whole calibration pipeline: frames out on a bounded cadence,
/// detections in through the link, correspondence resolution, surface
/// back-projection, pose derivation, and overlay refresh, all gated by the
/// calibration state machine.
///
/// `tick` is meant to be called from the host's per-frame update. It drains
/// inbound events in receipt order and never blocks on the network; when
/// nothing new arrived, the last resolved values are reused.
pub struct CalibrationSession<S: SurfaceTracker, M: MarkerScene> {
    config: SessionConfig,
    machine: CalibrationStateMachine,
    surfaces: S,
    overlay: OverlayManager<M>,
    decoder: DetectionDecoder,
    estimator: PoseEstimator,
    offset: ManualOffset,
    resolved: Latest<CornerQuad>,
    derived: Latest<BoardPose>,
    inbound: Receiver<TransportEvent>,
    producer: Option<FrameProducer>,
    link: Option<DetectorLink>,
    status: SessionStatus,
}

impl<S: SurfaceTracker, M: MarkerScene> CalibrationSession<S, M> {
    /// Assemble a session around an already-established inbound event
    /// stream. `connect` is the usual entry point; this one lets callers
    /// own the transport.
    pub fn new(
        config: SessionConfig,
        surfaces: S,
        scene: M,
        inbound: Receiver<TransportEvent>,
    ) -> Self {
        let overlay = OverlayManager::new(scene, config.animation, config.grid);
        let estimator = PoseEstimator::new(config.pose);
        Self {
            config,
            machine: CalibrationStateMachine::new(),
            surfaces,
            overlay,
            decoder: DetectionDecoder::new(),
            estimator,
            offset: ManualOffset::default(),
            resolved: Latest::new(),
            derived: Latest::new(),
            inbound,
            producer: None,
            link: None,
            status: SessionStatus::default(),
        }
    }

    /// Connect the detector link and spawn the frame producer onto its
    /// outbound queue. The producer starts disabled until streaming is
    /// toggled on.
    pub fn connect(
        config: SessionConfig,
        camera: impl FrameSource + 'static,
        surfaces: S,
        scene: M,
    ) -> Result<Self, SessionError> {
        let (link, inbound) = DetectorLink::connect(&config.endpoint)?;
        let producer = FrameProducer::spawn(
            camera,
            link.frame_sink(),
            Duration::from_secs_f32(config.frame_interval),
        )?;
        let mut session = Self::new(config, surfaces, scene, inbound);
        session.link = Some(link);
        session.producer = Some(producer);
        Ok(session)
    }

    #[inline]
    pub fn state(&self) -> CalibrationState {
        self.machine.state()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connection and decoding health.
    pub fn status(&self) -> SessionStatus {
        let mut status = self.status.clone();
        status.state = self.machine.state();
        status
    }

    /// Shared handle onto the latest derived pose, for readers outside the
    /// per-frame task.
    pub fn latest_pose(&self) -> Latest<BoardPose> {
        self.derived.clone()
    }

    /// The last fully sensor-derived pose, before manual offsets.
    pub fn baseline_pose(&self) -> Option<BoardPose> {
        self.estimator.baseline().copied()
    }

    /// Frames sent during the last completed one-second window.
    pub fn frames_per_second(&self) -> u32 {
        self.producer
            .as_ref()
            .map_or(0, FrameProducer::frames_per_second)
    }

    /// User toggle from the calibration control.
    pub fn toggle_streaming(&mut self) {
        let state = self.machine.toggle_streaming();
        if let Some(producer) = &self.producer {
            producer.set_enabled(self.machine.producer_active());
        }
        if state == CalibrationState::Idle {
            // An abandoned attempt starts over from fresh detections.
            self.resolved.clear();
        }
        info!("calibration state -> {state:?}");
    }

    /// Per-frame update: drain inbound events in receipt order, advance the
    /// locate pipeline, and animate overlays.
    pub fn tick(&mut self, dt: f32) {
        self.drain_inbound();
        self.locate();
        self.overlay.advance(dt);
    }

    /// Manual adjustment re-enters at the locked baseline; nothing is
    /// re-projected.
    pub fn set_manual_offset(&mut self, offset: ManualOffset) {
        self.offset = offset;
        self.publish_derived();
    }

    pub fn manual_offset(&self) -> ManualOffset {
        self.offset
    }

    /// Place the move markers at the current derived pose.
    pub fn place_markers(&mut self, from: &str, to: &str) -> Result<(), SessionError> {
        let pose = self
            .derived
            .snapshot()
            .filter(|_| self.machine.overlays_active())
            .ok_or(SessionError::BoardNotLocated)?;
        self.overlay.place_markers(&pose, from, to)?;
        Ok(())
    }

    /// Destroy the move markers.
    pub fn clear_markers(&mut self) {
        self.overlay.clear();
    }

    /// The overlay scene collaborator.
    pub fn scene(&self) -> &M {
        self.overlay.scene()
    }

    /// Tear down the producer and the link. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        if let Some(mut producer) = self.producer.take() {
            producer.stop();
        }
        if let Some(mut link) = self.link.take() {
            link.close();
        }
    }

    fn drain_inbound(&mut self) {
        loop {
            match self.inbound.try_recv() {
                Ok(TransportEvent::Message(payload)) => self.apply_message(&payload),
                Ok(TransportEvent::Error(reason)) => {
                    self.status.link_faults += 1;
                    warn!("transport fault: {reason}");
                    self.status.last_fault = Some(reason);
                }
                Ok(TransportEvent::Closed) => {
                    if !self.status.link_closed {
                        info!("detector link closed");
                    }
                    self.status.link_closed = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.status.link_closed = true;
                    break;
                }
            }
        }
    }

    fn apply_message(&mut self, payload: &[u8]) {
        if !self.machine.pipeline_active() {
            debug!("dropping detection message while idle");
            return;
        }
        match self.decoder.apply(payload) {
            Ok(DecodeOutcome::Resolved) => {
                if let Some(quad) = self.decoder.resolved() {
                    self.resolved.replace(*quad);
                }
                self.machine.quad_resolved();
            }
            Ok(DecodeOutcome::Pending { held }) => {
                debug!("detection batch of {held} points; waiting for 4");
            }
            Ok(DecodeOutcome::BoundingBoxes { count }) => {
                debug!("bounding-box batch of {count}; not fed to the pose pipeline");
            }
            Err(err) => {
                self.status.decode_faults += 1;
                warn!("dropping detection message: {err}");
                self.status.last_fault = Some(err.to_string());
            }
        }
    }

    fn locate(&mut self) {
        if !self.machine.pipeline_active() {
            return;
        }
        let Some(quad) = self.resolved.snapshot() else {
            return;
        };
        if self.surfaces.tracked_surface_count() == 0 {
            return;
        }
        let projected = project_quad(&quad, &self.config.viewport, &self.surfaces);
        let Some(world) = projected.complete() else {
            debug!(
                "{}/4 corners back-projected; holding last pose",
                projected.resolved_count()
            );
            return;
        };
        match self.estimator.update_from_quad(&world) {
            Ok(_) => {
                self.machine.pose_derived();
                self.publish_derived();
            }
            // Fail soft: a degenerate reading skips this tick's update.
            Err(err) => debug!("skipping pose update: {err}"),
        }
    }

    fn publish_derived(&mut self) {
        let Some(derived) = self.estimator.derived(&self.offset) else {
            return;
        };
        let changed = self
            .derived
            .snapshot()
            .is_none_or(|previous| previous != derived);
        self.derived.replace(derived);
        if changed && self.machine.overlays_active() {
            self.overlay.refresh(&derived);
        }
    }
}

impl<S: SurfaceTracker, M: MarkerScene> Drop for CalibrationSession<S, M> {
    fn drop(&mut self) {
        self.close();
    }
}
