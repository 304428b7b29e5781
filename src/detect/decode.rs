// Model output decoding.
//
// Two exporter layouts are supported, told apart by the trailing output
// dimension. The layout is resolved once when the model loads, not per frame.

use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::constants::{PRE_NMS_MAX_FIELDS, PRE_NMS_MIN_FIELDS};

use super::letterbox::LetterboxTransform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// Rows are (x1, y1, x2, y2, confidence, class[, extra]); the exporter
    /// already applied NMS.
    PreNms,
    /// Rows are (cx, cy, w, h, objectness, class scores...). No suppression
    /// is applied here, so overlapping duplicates from the exporter are
    /// counted as-is.
    RawAnchors,
}

impl OutputLayout {
    /// Resolve the layout from the trailing dimension of the output shape.
    pub fn from_trailing_dim(dim: usize) -> Option<OutputLayout> {
        if (PRE_NMS_MIN_FIELDS..=PRE_NMS_MAX_FIELDS).contains(&dim) {
            Some(OutputLayout::PreNms)
        } else if dim > PRE_NMS_MAX_FIELDS {
            Some(OutputLayout::RawAnchors)
        } else {
            None
        }
    }
}

/// A detection box in original-frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Decode raw output rows into original-frame boxes. Rows below the
/// confidence threshold or with too few fields are dropped; surviving boxes
/// are inverse-letterboxed and clipped to the frame.
pub fn decode(
    layout: OutputLayout,
    rows: ArrayView2<'_, f32>,
    confidence_threshold: f32,
    transform: &LetterboxTransform,
) -> Vec<BoundingBox> {
    let mut boxes = Vec::new();

    for row in rows.axis_iter(Axis(0)) {
        // Both layouts need at least (4 coords + score + 1)
        if row.len() < PRE_NMS_MIN_FIELDS {
            continue;
        }

        let corners = match layout {
            OutputLayout::PreNms => {
                let confidence = row[4];
                if confidence < confidence_threshold {
                    continue;
                }
                (row[0], row[1], row[2], row[3])
            }
            OutputLayout::RawAnchors => {
                let objectness = row[4];
                let class_score = row
                    .iter()
                    .skip(5)
                    .copied()
                    .fold(f32::NEG_INFINITY, f32::max);
                let confidence = objectness * class_score;
                if confidence < confidence_threshold {
                    continue;
                }
                let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
                (cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
            }
        };

        let (x1, y1) = transform.to_original(corners.0, corners.1);
        let (x2, y2) = transform.to_original(corners.2, corners.3);
        boxes.push(BoundingBox { x1, y1, x2, y2 });
    }

    boxes
}
