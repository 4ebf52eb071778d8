use board_anchor_core::{AddressError, BoardAddress, BoardPose};
use log::debug;
use nalgebra::{Point3, Vector3};

use crate::marker::{MarkerAnimation, MarkerId, MarkerRole, MarkerScene};

/// Errors raised by a marker placement request. A failed request performs no
/// placement and leaves existing markers alone.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OverlayError {
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),
    #[error("cell {address} lies outside the configured {grid}x{grid} grid")]
    OutsideGrid { address: BoardAddress, grid: u32 },
}

struct ActiveMarker {
    id: MarkerId,
    base: Point3<f32>,
    /// Board up at placement time; the bob rides it until the marker dies.
    bob_axis: Vector3<f32>,
}

/// Creates, animates, and re-derives the move markers against the current
/// board pose.
pub struct OverlayManager<S: MarkerScene> {
    scene: S,
    animation: MarkerAnimation,
    grid: u32,
    clock: f32,
    request: Option<(BoardAddress, BoardAddress)>,
    active: Vec<ActiveMarker>,
}

impl<S: MarkerScene> OverlayManager<S> {
    pub fn new(scene: S, animation: MarkerAnimation, grid: u32) -> Self {
        Self {
            scene,
            animation,
            grid,
            clock: 0.0,
            request: None,
            active: Vec::new(),
        }
    }

    /// The scene collaborator, for callers that share it with other overlays.
    pub fn scene(&self) -> &S {
        &self.scene
    }

    /// The last successfully requested address pair.
    pub fn request(&self) -> Option<(BoardAddress, BoardAddress)> {
        self.request
    }

    /// Place the "from"/"to" pair for a move, replacing any previous pair.
    /// Both addresses are validated before anything is touched.
    pub fn place_markers(
        &mut self,
        pose: &BoardPose,
        from: &str,
        to: &str,
    ) -> Result<(), OverlayError> {
        let from = self.checked_address(from)?;
        let to = self.checked_address(to)?;
        self.request = Some((from, to));
        self.rebuild(pose);
        Ok(())
    }

    /// Re-derive marker placement after the board pose changed. Markers are
    /// destroyed and recreated rather than moved under the new transform.
    pub fn refresh(&mut self, pose: &BoardPose) {
        if self.request.is_some() {
            self.rebuild(pose);
        }
    }

    /// Destroy all markers and forget the last request; their idle animation
    /// dies with them.
    pub fn clear(&mut self) {
        self.despawn_all();
        self.request = None;
    }

    /// Advance the idle animation: a bounded vertical oscillation about each
    /// marker's placement position.
    pub fn advance(&mut self, dt: f32) {
        self.clock += dt;
        let swing = self.animation.amplitude
            * (std::f32::consts::TAU * self.animation.frequency * self.clock).sin();
        for marker in &self.active {
            self.scene
                .set_position(marker.id, marker.base + marker.bob_axis * swing);
        }
    }

    fn checked_address(&self, text: &str) -> Result<BoardAddress, OverlayError> {
        let address = BoardAddress::parse(text)?;
        if u32::from(address.file) >= self.grid || u32::from(address.rank) >= self.grid {
            return Err(OverlayError::OutsideGrid {
                address,
                grid: self.grid,
            });
        }
        Ok(address)
    }

    fn rebuild(&mut self, pose: &BoardPose) {
        self.despawn_all();
        let Some((from, to)) = self.request else {
            return;
        };
        for (address, role) in [(from, MarkerRole::From), (to, MarkerRole::To)] {
            let (dx, dy) = address.cell_offset(self.grid, pose.size);
            let base = pose.local_to_world(dx, dy);
            let id = self.scene.spawn(role, role.default_color(), base);
            self.active.push(ActiveMarker {
                id,
                base,
                bob_axis: pose.up.into_inner(),
            });
        }
        debug!("placed markers {from} -> {to} against board at {:?}", pose.center);
    }

    fn despawn_all(&mut self) {
        for marker in self.active.drain(..) {
            self.scene.despawn(marker.id);
        }
    }
}
