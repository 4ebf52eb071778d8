use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Stable identity of a board corner in detector image space.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CornerLabel {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl CornerLabel {
    /// All labels in TL, TR, BL, BR order.
    pub const ALL: [CornerLabel; 4] = [
        CornerLabel::TopLeft,
        CornerLabel::TopRight,
        CornerLabel::BottomLeft,
        CornerLabel::BottomRight,
    ];
}

/// Four detector-space points with resolved corner identities.
///
/// Detector coordinates have their origin at the top-left of the image with
/// the vertical axis growing downward.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CornerQuad {
    pub top_left: Point2<f32>,
    pub top_right: Point2<f32>,
    pub bottom_left: Point2<f32>,
    pub bottom_right: Point2<f32>,
}

impl CornerQuad {
    /// Label an unordered 4-point set as TL/TR/BL/BR.
    ///
    /// The four points are sorted by vertical coordinate; the first two form
    /// the upper pair, the last two the lower pair, and each pair is ordered
    /// left-to-right. The labeling is invariant under any permutation of the
    /// input. Quads tilted beyond 45° from axis alignment are mislabeled;
    /// the camera is assumed roughly upright.
    pub fn resolve(points: &[Point2<f32>; 4]) -> Self {
        let mut sorted = *points;
        sorted.sort_by(|a, b| a.y.total_cmp(&b.y));

        let (mut upper, mut lower) = ([sorted[0], sorted[1]], [sorted[2], sorted[3]]);
        upper.sort_by(|a, b| a.x.total_cmp(&b.x));
        lower.sort_by(|a, b| a.x.total_cmp(&b.x));

        Self {
            top_left: upper[0],
            top_right: upper[1],
            bottom_left: lower[0],
            bottom_right: lower[1],
        }
    }

    /// Corner position for a label.
    #[inline]
    pub fn get(&self, label: CornerLabel) -> Point2<f32> {
        match label {
            CornerLabel::TopLeft => self.top_left,
            CornerLabel::TopRight => self.top_right,
            CornerLabel::BottomLeft => self.bottom_left,
            CornerLabel::BottomRight => self.bottom_right,
        }
    }

    /// Labeled corners in TL, TR, BL, BR order.
    pub fn corners(&self) -> [(CornerLabel, Point2<f32>); 4] {
        CornerLabel::ALL.map(|label| (label, self.get(label)))
    }
}
