//! Minimal greedy IoU tracker used when no external tracker is usable.

use std::collections::BTreeMap;

use crate::tracker::matching::{AssignmentResult, Detection, greedy_assignment};
use crate::tracker::rect::{Rect, iou_batch};
use crate::tracker::target::{TrackId, TrackedIdentity};

#[derive(Debug, Clone)]
struct IouTrack {
    bbox: Rect,
    /// Ticks since the track was last matched
    age: u32,
}

/// Greedy IoU tracker. Ids increase monotonically and are never reused; an
/// id is stable only while its track keeps matching.
#[derive(Debug, Clone)]
pub struct IouTracker {
    iou_threshold: f32,
    max_age: u32,
    next_id: TrackId,
    // Ordered by id, so older tracks get first pick of the detections.
    tracks: BTreeMap<TrackId, IouTrack>,
}

impl IouTracker {
    /// Tracks survive `max_age` unmatched updates; matches need IoU of at least `iou_threshold`.
    pub fn new(iou_threshold: f32, max_age: u32) -> Self {
        Self {
            iou_threshold,
            max_age,
            next_id: 1,
            tracks: BTreeMap::new(),
        }
    }

    /// Associate one frame of detections. Returns matched tracks followed by
    /// newly spawned ones; tracks that went unmatched this frame are not
    /// reported.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackedIdentity> {
        let ids: Vec<TrackId> = self.tracks.keys().copied().collect();
        let track_rects: Vec<Rect> = self.tracks.values().map(|t| t.bbox).collect();
        let det_rects: Vec<Rect> = detections.iter().map(|d| d.bbox).collect();
        let ious = iou_batch(&track_rects, &det_rects);

        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = greedy_assignment(&ious, self.iou_threshold);

        let mut output = Vec::with_capacity(detections.len());
        for (itrack, idet) in matches {
            let id = ids[itrack];
            if let Some(track) = self.tracks.get_mut(&id) {
                track.bbox = det_rects[idet];
                track.age = 0;
                output.push(TrackedIdentity {
                    id,
                    bbox: track.bbox,
                });
            }
        }

        for itrack in unmatched_tracks {
            let id = ids[itrack];
            let expired = match self.tracks.get_mut(&id) {
                Some(track) => {
                    track.age += 1;
                    track.age > self.max_age
                }
                None => false,
            };
            if expired {
                self.tracks.remove(&id);
            }
        }

        for idet in unmatched_detections {
            let id = self.next_id;
            self.next_id += 1;
            let bbox = det_rects[idet];
            self.tracks.insert(id, IouTrack { bbox, age: 0 });
            output.push(TrackedIdentity { id, bbox });
        }

        output
    }

    /// Number of tracks currently held, matched or coasting.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_persist_while_matched() {
        let mut tracker = IouTracker::new(0.3, 2);
        let first = tracker.update(&[Detection::new(100.0, 100.0, 200.0, 200.0, 0.9)]);
        assert_eq!(first.len(), 1);
        let id = first[0].id;

        let second = tracker.update(&[Detection::new(105.0, 105.0, 205.0, 205.0, 0.9)]);
        assert_eq!(second[0].id, id);
        assert_eq!(second[0].bbox, Rect::from_tlbr(105.0, 105.0, 205.0, 205.0));
    }

    #[test]
    fn test_unmatched_tracks_age_out() {
        let mut tracker = IouTracker::new(0.3, 2);
        tracker.update(&[Detection::new(0.0, 0.0, 10.0, 10.0, 0.9)]);
        tracker.update(&[]);
        tracker.update(&[]);
        assert_eq!(tracker.len(), 1);
        tracker.update(&[]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_coasting_track_is_rematched() {
        let mut tracker = IouTracker::new(0.3, 5);
        let id = tracker.update(&[Detection::new(0.0, 0.0, 10.0, 10.0, 0.9)])[0].id;
        assert!(tracker.update(&[]).is_empty());
        let again = tracker.update(&[Detection::new(1.0, 1.0, 11.0, 11.0, 0.9)]);
        assert_eq!(again[0].id, id);
    }

    #[test]
    fn test_ids_never_reused() {
        let mut tracker = IouTracker::new(0.3, 0);
        let a = tracker.update(&[Detection::new(0.0, 0.0, 10.0, 10.0, 0.9)])[0].id;
        tracker.update(&[]);
        assert!(tracker.is_empty());
        let b = tracker.update(&[Detection::new(0.0, 0.0, 10.0, 10.0, 0.9)])[0].id;
        assert!(b > a);
    }

    #[test]
    fn test_unmatched_detections_spawn_after_matches() {
        let mut tracker = IouTracker::new(0.3, 5);
        let id = tracker.update(&[Detection::new(0.0, 0.0, 10.0, 10.0, 0.9)])[0].id;
        let out = tracker.update(&[
            Detection::new(300.0, 300.0, 310.0, 310.0, 0.9),
            Detection::new(0.0, 0.0, 10.0, 10.0, 0.9),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, id);
        assert_eq!(out[1].id, id + 1);
    }
}
