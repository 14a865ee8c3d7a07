use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use crate::error::ObservationError;
use crate::tracker::{FrameIndex, Rect, TrackId};
use crate::violation::grid::GridCell;

/// One identity's violation evidence for the current tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationObservation {
    pub identity: TrackId,
    pub bbox: Rect,
    pub missing_attributes: Vec<String>,
    pub location_tag: Option<String>,
}

impl ViolationObservation {
    /// Observation without a location tag.
    pub fn new(identity: TrackId, bbox: Rect, missing_attributes: Vec<String>) -> Self {
        Self {
            identity,
            bbox,
            missing_attributes,
            location_tag: None,
        }
    }

    /// Attach the zone the identity stands in.
    pub fn with_location(mut self, tag: impl Into<String>) -> Self {
        self.location_tag = Some(tag.into());
        self
    }

    /// Reject invalid boxes and empty attribute names.
    pub fn validate(&self) -> Result<(), ObservationError> {
        if !self.bbox.is_valid() {
            let [x1, y1, x2, y2] = self.bbox.to_tlbr();
            return Err(ObservationError::InvalidBox { x1, y1, x2, y2 });
        }
        if self.missing_attributes.iter().any(|a| a.is_empty()) {
            return Err(ObservationError::EmptyAttributeName(self.identity));
        }
        Ok(())
    }
}

/// How an observation affected a record's streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Streak {
    Extended,
    Reset,
    /// Same identity seen twice within one frame.
    Merged,
}

/// Violation state of one identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationRecord {
    pub violation_start: f64,
    pub first_frame_index: FrameIndex,
    pub last_seen: f64,
    pub last_seen_frame_index: FrameIndex,
    pub consecutive_frame_count: u32,
    pub missing_attributes: BTreeSet<String>,
    pub grid_cell: GridCell,
    pub alerted: bool,
    pub bbox: Rect,
    pub recent_boxes: VecDeque<Rect>,
    pub location_tag: Option<String>,
    box_capacity: usize,
}

impl ViolationRecord {
    pub(crate) fn new(
        now: f64,
        frame: FrameIndex,
        obs: &ViolationObservation,
        cell: GridCell,
        box_capacity: usize,
    ) -> Self {
        let mut record = Self {
            violation_start: now,
            first_frame_index: frame,
            last_seen: now,
            last_seen_frame_index: frame,
            consecutive_frame_count: 1,
            missing_attributes: BTreeSet::new(),
            grid_cell: cell,
            alerted: false,
            bbox: obs.bbox,
            recent_boxes: VecDeque::with_capacity(box_capacity),
            location_tag: None,
            box_capacity: box_capacity.max(1),
        };
        record.absorb(obs, cell);
        record
    }

    pub(crate) fn observe(
        &mut self,
        now: f64,
        frame: FrameIndex,
        obs: &ViolationObservation,
        cell: GridCell,
    ) -> Streak {
        let streak = if frame.follows(self.last_seen_frame_index) {
            self.consecutive_frame_count += 1;
            Streak::Extended
        } else if frame == self.last_seen_frame_index {
            Streak::Merged
        } else {
            self.consecutive_frame_count = 1;
            self.first_frame_index = frame;
            self.violation_start = now;
            Streak::Reset
        };
        self.last_seen = now;
        self.last_seen_frame_index = frame;
        self.absorb(obs, cell);
        streak
    }

    fn absorb(&mut self, obs: &ViolationObservation, cell: GridCell) {
        self.missing_attributes
            .extend(obs.missing_attributes.iter().cloned());
        self.grid_cell = cell;
        self.bbox = obs.bbox;
        if let Some(tag) = obs.location_tag.as_deref().filter(|t| !t.is_empty()) {
            self.location_tag = Some(tag.to_string());
        }
        if self.recent_boxes.back() != Some(&obs.bbox) {
            if self.recent_boxes.len() == self.box_capacity {
                self.recent_boxes.pop_front();
            }
            self.recent_boxes.push_back(obs.bbox);
        }
    }

    /// Seconds since the current streak started.
    pub fn elapsed(&self, now: f64) -> f64 {
        now - self.violation_start
    }

    /// Sorted missing attributes.
    pub fn missing(&self) -> Vec<String> {
        self.missing_attributes.iter().cloned().collect()
    }
}

/// Content key for "the same logical violation": camera, cell and the
/// sorted set of missing attributes, independent of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViolationHash(String);

impl ViolationHash {
    /// `{camera}:{x}:{y}:{sorted,attributes}`.
    pub fn new<I, S>(camera_id: &str, cell: GridCell, missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sorted: BTreeSet<String> = missing
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        let attrs = sorted.into_iter().collect::<Vec<_>>().join(",");
        Self(format!("{camera_id}:{}:{}:{attrs}", cell.x, cell.y))
    }

    /// The hash as a store key suffix.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViolationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
