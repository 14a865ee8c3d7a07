mod adapter;
mod iou_tracker;
mod matching;
mod rect;
mod target;
mod track_state;

pub use adapter::IdentityTracker;
pub use iou_tracker::IouTracker;
pub use matching::{AssignmentResult, Detection, greedy_assignment};
pub use rect::{Rect, iou_batch};
pub use target::{ExternalTarget, ExternalTracker, FrameIndex, TrackId, TrackedIdentity};
pub use track_state::TrackerMode;
