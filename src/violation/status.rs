use std::fmt;

use crate::tracker::TrackId;

/// Where a violation stands, for overlays and external queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViolationStatus {
    AwaitingFrames { remaining: u32 },
    AwaitingTime { remaining_seconds: f64 },
    /// Confirmed but not (yet) alerted.
    Active,
    Alerted,
}

impl fmt::Display for ViolationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViolationStatus::AwaitingFrames { .. } => "awaiting frames",
            ViolationStatus::AwaitingTime { .. } => "awaiting time",
            ViolationStatus::Active => "active",
            ViolationStatus::Alerted => "alerted",
        })
    }
}

/// Lookup key for [`ViolationEngine::get_status`].
///
/// [`ViolationEngine::get_status`]: crate::violation::ViolationEngine::get_status
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusQuery {
    Identity(TrackId),
    /// Any non-alerted record in the cell containing this pixel.
    Point { x: f32, y: f32 },
    /// Identity first, then the point's cell.
    IdentityOrPoint { identity: TrackId, x: f32, y: f32 },
}
