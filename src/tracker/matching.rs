//! Detection input and greedy IoU association.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::ObservationError;
use crate::tracker::rect::Rect;

/// Person detection input for the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: Rect,
    /// Detection confidence score
    pub score: f32,
}

impl Detection {
    /// Build from TLBR corners `(x1, y1, x2, y2)` and a score.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            score,
        }
    }

    /// Build from an existing [`Rect`].
    pub fn from_rect(bbox: Rect, score: f32) -> Self {
        Self { bbox, score }
    }

    /// Reject non-finite or inverted boxes and non-finite scores.
    pub fn validate(&self) -> Result<(), ObservationError> {
        if self.bbox.is_valid() && self.score.is_finite() {
            Ok(())
        } else {
            let [x1, y1, x2, y2] = self.bbox.to_tlbr();
            Err(ObservationError::InvalidBox { x1, y1, x2, y2 })
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Greedy association over an IoU similarity matrix of shape (tracks, detections).
///
/// Rows are visited in order. Each row claims the still-unclaimed column with
/// the highest IoU, and the claim is kept only if that IoU reaches `thresh`.
/// A zero-overlap column is never claimed.
pub fn greedy_assignment(ious: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = ious.dim();
    let mut claimed = vec![false; num_cols];
    let mut result = AssignmentResult::default();

    for i in 0..num_rows {
        let mut best: Option<(usize, f32)> = None;
        for j in 0..num_cols {
            if claimed[j] {
                continue;
            }
            let iou = ious[[i, j]];
            if iou > best.map_or(0.0, |(_, b)| b) {
                best = Some((j, iou));
            }
        }
        match best {
            Some((j, iou)) if iou >= thresh => {
                claimed[j] = true;
                result.matches.push((i, j));
            }
            _ => result.unmatched_tracks.push(i),
        }
    }

    result.unmatched_detections = claimed
        .iter()
        .enumerate()
        .filter_map(|(j, &c)| if c { None } else { Some(j) })
        .collect();
    result
}
