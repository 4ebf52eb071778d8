use nalgebra::{Matrix3, Point3, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

/// Errors produced while deriving a board pose from world points.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("quad edge too short to orient the board (length {length})")]
    CollapsedEdge { length: f32 },
    #[error("detected quad is degenerate (basis cross norm {norm})")]
    DegenerateGeometry { norm: f32 },
}

/// Four back-projected corner positions in world space, labeled as in the
/// detector image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldQuad {
    pub top_left: Point3<f32>,
    pub top_right: Point3<f32>,
    pub bottom_left: Point3<f32>,
    pub bottom_right: Point3<f32>,
}

/// Tuning for the pose derivation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PoseParams {
    /// Offset of the board center along its up axis, lifting the board off
    /// the tracked surface to avoid z-fighting.
    pub surface_lift: f32,
    /// Minimal norm accepted for a basis edge or cross product before the
    /// derivation is rejected as degenerate.
    pub min_basis_norm: f32,
}

impl Default for PoseParams {
    fn default() -> Self {
        Self {
            surface_lift: 0.005,
            min_basis_norm: 1e-4,
        }
    }
}

/// User-driven adjustment composed onto the last derived baseline pose.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManualOffset {
    /// Translation along the baseline's own axes: x → right, y → up,
    /// z → forward.
    pub translation: Vector3<f32>,
    /// Rotation about the baseline up axis, radians.
    pub yaw: f32,
    /// Multiplier applied to the baseline size.
    pub scale: f32,
}

impl Default for ManualOffset {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            yaw: 0.0,
            scale: 1.0,
        }
    }
}

impl ManualOffset {
    pub fn is_identity(&self) -> bool {
        self.translation == Vector3::zeros() && self.yaw == 0.0 && self.scale == 1.0
    }
}

/// The authoritative world anchor of the board: center, orthonormal
/// right/forward/up triple, and uniform extent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardPose {
    pub center: Point3<f32>,
    pub right: Unit<Vector3<f32>>,
    pub forward: Unit<Vector3<f32>>,
    pub up: Unit<Vector3<f32>>,
    pub size: f32,
}

impl BoardPose {
    /// Rotation mapping board-local axes (x right, y forward, z up) to world.
    pub fn rotation(&self) -> Rotation3<f32> {
        Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[
            self.right.into_inner(),
            self.forward.into_inner(),
            self.up.into_inner(),
        ]))
    }

    /// Compose a manual offset onto this pose. The translation rides the
    /// pose's own axes and the yaw spins about its up axis; the pose itself
    /// is left untouched.
    pub fn with_offset(&self, offset: &ManualOffset) -> BoardPose {
        let spin = Rotation3::from_axis_angle(&self.up, offset.yaw);
        let t = offset.translation;
        BoardPose {
            center: self.center
                + self.right.into_inner() * t.x
                + self.up.into_inner() * t.y
                + self.forward.into_inner() * t.z,
            right: Unit::new_unchecked(spin * self.right.into_inner()),
            forward: Unit::new_unchecked(spin * self.forward.into_inner()),
            up: self.up,
            size: self.size * offset.scale,
        }
    }

    /// World position of a board-local cell offset (dx along right, dy along
    /// forward).
    pub fn local_to_world(&self, dx: f32, dy: f32) -> Point3<f32> {
        self.center + self.right.into_inner() * dx + self.forward.into_inner() * dy
    }
}

/// Derive a board pose from a complete world quad.
///
/// `right` comes from the bottom edge and `forward` from the left edge. The
/// up axis is their cross product; `forward` is then recomputed as
/// `up × right` so the triple is orthonormal even on noisy input, preserving
/// `right` as the better-conditioned baseline. The center is the corner mean
/// lifted by `surface_lift` along up, and the size is the longer of the two
/// measured edges so the board stays square on trapezoidal detections.
pub fn derive_pose(quad: &WorldQuad, params: &PoseParams) -> Result<BoardPose, PoseError> {
    let right_raw = quad.bottom_right - quad.bottom_left;
    let forward_raw = quad.top_left - quad.bottom_left;

    let right_len = right_raw.norm();
    let forward_len = forward_raw.norm();
    let shortest = right_len.min(forward_len);
    if shortest <= params.min_basis_norm {
        return Err(PoseError::CollapsedEdge { length: shortest });
    }

    let right = Unit::new_unchecked(right_raw / right_len);
    let forward_seed = forward_raw / forward_len;
    let up_raw = right.into_inner().cross(&forward_seed);
    let up_norm = up_raw.norm();
    if up_norm <= params.min_basis_norm {
        return Err(PoseError::DegenerateGeometry { norm: up_norm });
    }
    let up = Unit::new_unchecked(up_raw / up_norm);
    let forward = Unit::new_normalize(up.into_inner().cross(&right.into_inner()));

    let centroid = Point3::from(
        (quad.top_left.coords
            + quad.top_right.coords
            + quad.bottom_left.coords
            + quad.bottom_right.coords)
            / 4.0,
    );

    Ok(BoardPose {
        center: centroid + up.into_inner() * params.surface_lift,
        right,
        forward,
        up,
        size: right_len.max(forward_len),
    })
}

/// Owns the locked baseline pose and composes manual offsets onto it.
///
/// The baseline is replaced as a whole on every successful re-derivation and
/// held unchanged on failure, so readers never observe a partial update.
#[derive(Debug, Default)]
pub struct PoseEstimator {
    params: PoseParams,
    baseline: Option<BoardPose>,
}

impl PoseEstimator {
    pub fn new(params: PoseParams) -> Self {
        Self {
            params,
            baseline: None,
        }
    }

    /// The last fully sensor-derived pose, before any manual offset.
    #[inline]
    pub fn baseline(&self) -> Option<&BoardPose> {
        self.baseline.as_ref()
    }

    /// Full re-derivation from a fresh world quad. Replaces the baseline
    /// atomically on success; a degenerate quad leaves it untouched.
    pub fn update_from_quad(&mut self, quad: &WorldQuad) -> Result<BoardPose, PoseError> {
        let pose = derive_pose(quad, &self.params)?;
        self.baseline = Some(pose);
        Ok(pose)
    }

    /// The pose overlays should use: baseline composed with the given manual
    /// offset. `None` until a first full derivation succeeds.
    pub fn derived(&self, offset: &ManualOffset) -> Option<BoardPose> {
        self.baseline.map(|baseline| baseline.with_offset(offset))
    }
}
