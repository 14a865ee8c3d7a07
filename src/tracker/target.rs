//! Identity types and the external tracker protocol.

use std::fmt;

use crate::error::TrackerError;
use crate::tracker::matching::Detection;
use crate::tracker::rect::Rect;

/// Opaque, ephemeral identity assigned by a tracker.
pub type TrackId = u64;

/// Per-camera monotonically increasing frame counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// The following frame.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// True when `self` is the frame immediately after `previous`.
    pub fn follows(self, previous: FrameIndex) -> bool {
        previous.0.checked_add(1) == Some(self.0)
    }
}

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tracked person for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedIdentity {
    pub id: TrackId,
    pub bbox: Rect,
}

/// Raw target as reported by an external tracker. Trackers disagree on the
/// shape of their output, so all the shapes seen in practice are accepted
/// and normalized by [`ExternalTarget::normalize`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalTarget {
    /// Top-left x, top-left y, width, height.
    Tlwh { track_id: i64, tlwh: [f32; 4] },
    /// x1, y1, x2, y2.
    Tlbr { track_id: i64, tlbr: [f32; 4] },
    /// Loose row `[x1, y1, x2, y2, id, ..]`.
    Row(Vec<f32>),
}

impl ExternalTarget {
    /// Convert to a [`TrackedIdentity`]. Only shape problems are errors; a
    /// finite but degenerate box is passed through.
    pub fn normalize(&self) -> Result<TrackedIdentity, TrackerError> {
        let (track_id, bbox) = match self {
            Self::Tlwh { track_id, tlwh } => {
                (*track_id, Rect::new(tlwh[0], tlwh[1], tlwh[2], tlwh[3]))
            }
            Self::Tlbr { track_id, tlbr } => {
                (*track_id, Rect::from_tlbr(tlbr[0], tlbr[1], tlbr[2], tlbr[3]))
            }
            Self::Row(row) => {
                if row.len() < 5 {
                    return Err(TrackerError::Protocol(format!(
                        "row has {} values, expected at least 5",
                        row.len()
                    )));
                }
                let raw_id = row[4];
                if !raw_id.is_finite() || raw_id.fract() != 0.0 {
                    return Err(TrackerError::Protocol(format!(
                        "row id {raw_id} is not an integer"
                    )));
                }
                (raw_id as i64, Rect::from_tlbr(row[0], row[1], row[2], row[3]))
            }
        };

        let id = TrackId::try_from(track_id)
            .map_err(|_| TrackerError::Protocol(format!("negative track id {track_id}")))?;
        if !bbox.is_finite() {
            return Err(TrackerError::Protocol(format!(
                "track {id} has a non-finite box {:?}",
                bbox.to_tlbr()
            )));
        }
        Ok(TrackedIdentity { id, bbox })
    }
}

/// A full multi-object tracker living outside this crate.
pub trait ExternalTracker: Send {
    /// Feed one frame of detections. `frame_size` is `(height, width)`.
    fn update(
        &mut self,
        detections: &[Detection],
        frame_size: Option<(u32, u32)>,
    ) -> Result<Vec<ExternalTarget>, TrackerError>;
}
