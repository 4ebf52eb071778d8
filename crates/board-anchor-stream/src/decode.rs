use board_anchor_core::CornerQuad;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Errors raised while decoding an inbound detection message. Any of these
/// leaves the decoder's previous state untouched.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("malformed detection message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("detection message carries {count} points where at most 4 are meaningful")]
    TooManyPoints { count: usize },
    #[error("detection message mixes point and bounding-box records")]
    MixedShapes,
}

/// One detected point in detector image space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub center_x: f32,
    pub center_y: f32,
}

/// One detected bounding box in detector image space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxRecord {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

/// The two wire shapes a deployed detector may report.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CornerRecord {
    Point(PointRecord),
    Box(BoxRecord),
}

/// Inbound message: a self-describing record listing detections.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionMessage {
    pub corners: Vec<CornerRecord>,
}

/// What an applied message contributed to the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Four points held; corner labeling replaced.
    Resolved,
    /// Fewer than four points; resolution skipped, prior labeling retained.
    Pending { held: usize },
    /// Bounding-box deployment shape; retained for display, does not feed
    /// the pose pipeline.
    BoundingBoxes { count: usize },
}

/// Turns inbound detector messages into a working point list and, when four
/// points are held, a labeled [`CornerQuad`].
///
/// Every successful point batch replaces the working list wholesale; batches
/// are never merged. A malformed payload keeps the previous state, stale but
/// valid.
#[derive(Debug, Default)]
pub struct DetectionDecoder {
    points: Vec<Point2<f32>>,
    boxes: Vec<BoxRecord>,
    resolved: Option<CornerQuad>,
}

impl DetectionDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one inbound message payload.
    pub fn apply(&mut self, payload: &[u8]) -> Result<DecodeOutcome, DecodeError> {
        let message: DetectionMessage = serde_json::from_slice(payload)?;

        let mut points = Vec::new();
        let mut boxes = Vec::new();
        for corner in &message.corners {
            match corner {
                CornerRecord::Point(p) => points.push(Point2::new(p.center_x, p.center_y)),
                CornerRecord::Box(b) => boxes.push(*b),
            }
        }

        if !boxes.is_empty() {
            if !points.is_empty() {
                return Err(DecodeError::MixedShapes);
            }
            let count = boxes.len();
            self.boxes = boxes;
            return Ok(DecodeOutcome::BoundingBoxes { count });
        }

        if points.len() > 4 {
            return Err(DecodeError::TooManyPoints {
                count: points.len(),
            });
        }

        self.points = points;
        if self.points.len() == 4 {
            let quad = [self.points[0], self.points[1], self.points[2], self.points[3]];
            self.resolved = Some(CornerQuad::resolve(&quad));
            Ok(DecodeOutcome::Resolved)
        } else {
            Ok(DecodeOutcome::Pending {
                held: self.points.len(),
            })
        }
    }

    /// The working point list from the latest point batch, unordered.
    pub fn points(&self) -> &[Point2<f32>] {
        &self.points
    }

    /// The latest bounding-box batch, if the deployment reports boxes.
    pub fn bounding_boxes(&self) -> &[BoxRecord] {
        &self.boxes
    }

    /// The most recent corner labeling. Survives short or malformed batches
    /// until a fresh 4-point batch replaces it.
    pub fn resolved(&self) -> Option<&CornerQuad> {
        self.resolved.as_ref()
    }
}
