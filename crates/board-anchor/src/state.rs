use serde::{Deserialize, Serialize};

/// Mode of the calibration pipeline.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CalibrationState {
    /// No streaming, no overlays.
    #[default]
    Idle,
    /// Frames flow to the detector; no pose yet.
    Streaming,
    /// A resolved corner quad is held; back-projection is converging.
    Locating,
    /// A full pose has been derived at least once. Overlays and manual
    /// offsets are live, and the state is sticky: re-derivations update the
    /// board in place.
    Located,
}

/// Governs which pipeline components run.
#[derive(Debug, Default)]
pub struct CalibrationStateMachine {
    state: CalibrationState,
    producer_enabled: bool,
}

impl CalibrationStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// User toggle. From Idle it begins streaming; from Streaming or
    /// Locating it abandons the attempt; in Located only the frame producer
    /// flips, the located board and its overlays persist.
    pub fn toggle_streaming(&mut self) -> CalibrationState {
        match self.state {
            CalibrationState::Idle => {
                self.state = CalibrationState::Streaming;
                self.producer_enabled = true;
            }
            CalibrationState::Streaming | CalibrationState::Locating => {
                self.state = CalibrationState::Idle;
                self.producer_enabled = false;
            }
            CalibrationState::Located => {
                self.producer_enabled = !self.producer_enabled;
            }
        }
        self.state
    }

    /// A resolved quad is now held; locating begins.
    pub fn quad_resolved(&mut self) {
        if self.state == CalibrationState::Streaming {
            self.state = CalibrationState::Locating;
        }
    }

    /// A full pose derivation completed.
    pub fn pose_derived(&mut self) {
        if matches!(
            self.state,
            CalibrationState::Streaming | CalibrationState::Locating
        ) {
            self.state = CalibrationState::Located;
        }
    }

    /// Whether the frame producer should be running.
    pub fn producer_active(&self) -> bool {
        self.producer_enabled && self.state != CalibrationState::Idle
    }

    /// Whether inbound detections feed the pose pipeline.
    pub fn pipeline_active(&self) -> bool {
        self.state != CalibrationState::Idle
    }

    /// Whether overlays and manual offsets are live.
    pub fn overlays_active(&self) -> bool {
        self.state == CalibrationState::Located
    }
}
