//! Normalizes external tracker output, with a permanent IoU fallback.

use tracing::{info, warn};

use crate::config::TrackerSettings;
use crate::error::TrackerError;
use crate::tracker::iou_tracker::IouTracker;
use crate::tracker::matching::Detection;
use crate::tracker::target::{ExternalTracker, FrameIndex, TrackedIdentity};
use crate::tracker::track_state::TrackerMode;

/// Per-camera identity source.
///
/// Wraps an [`ExternalTracker`] and converts its output to
/// [`TrackedIdentity`]. The first error or unrecognized output switches the
/// adapter to an [`IouTracker`] for the remainder of the session; the
/// external tracker is dropped and never retried.
pub struct IdentityTracker {
    camera_id: String,
    external: Option<Box<dyn ExternalTracker>>,
    fallback: IouTracker,
    mode: TrackerMode,
    min_score: f32,
    frame_size: Option<(u32, u32)>,
    last_frame: Option<FrameIndex>,
}

impl IdentityTracker {
    /// Normalize `external`, falling back to the IoU tracker on the first mismatch.
    pub fn new(
        camera_id: impl Into<String>,
        external: Box<dyn ExternalTracker>,
        settings: &TrackerSettings,
    ) -> Self {
        let mut tracker = Self::fallback_only(camera_id, settings);
        tracker.external = Some(external);
        tracker.mode = TrackerMode::External;
        tracker
    }

    /// No external tracker available; run the IoU tracker from the start.
    pub fn fallback_only(camera_id: impl Into<String>, settings: &TrackerSettings) -> Self {
        Self {
            camera_id: camera_id.into(),
            external: None,
            fallback: IouTracker::new(settings.iou_threshold, settings.max_age),
            mode: TrackerMode::Fallback,
            min_score: settings.min_score,
            frame_size: None,
            last_frame: None,
        }
    }

    /// `(height, width)` forwarded to external trackers that want it.
    pub fn with_frame_size(mut self, height: u32, width: u32) -> Self {
        self.frame_size = Some((height, width));
        self
    }

    /// Which backend produced the last frame's identities.
    pub fn mode(&self) -> TrackerMode {
        self.mode
    }

    /// Frame index of the most recent [`IdentityTracker::update`].
    pub fn last_frame(&self) -> Option<FrameIndex> {
        self.last_frame
    }

    /// Track one frame. Invalid or low-score detections are dropped first.
    pub fn update(&mut self, frame: FrameIndex, detections: &[Detection]) -> Vec<TrackedIdentity> {
        if let Some(last) = self.last_frame
            && frame <= last
        {
            warn!(
                camera = %self.camera_id,
                frame = %frame,
                last = %last,
                "frame index did not increase"
            );
        }
        self.last_frame = Some(frame);

        let detections: Vec<Detection> = detections
            .iter()
            .filter(|d| match d.validate() {
                Ok(()) => d.score >= self.min_score,
                Err(err) => {
                    warn!(camera = %self.camera_id, frame = %frame, error = %err, "dropping detection");
                    false
                }
            })
            .copied()
            .collect();

        if let Some(external) = self.external.as_mut() {
            let result = external
                .update(&detections, self.frame_size)
                .and_then(|targets| {
                    targets
                        .iter()
                        .map(|t| t.normalize())
                        .collect::<Result<Vec<_>, TrackerError>>()
                });
            match result {
                Ok(identities) => {
                    return identities
                        .into_iter()
                        .filter(|identity| {
                            let keep = identity.bbox.is_valid();
                            if !keep {
                                warn!(
                                    camera = %self.camera_id,
                                    frame = %frame,
                                    identity = identity.id,
                                    tlbr = ?identity.bbox.to_tlbr(),
                                    "dropping tracked identity with a degenerate box"
                                );
                            }
                            keep
                        })
                        .collect();
                }
                Err(err) => {
                    info!(
                        camera = %self.camera_id,
                        frame = %frame,
                        error = %err,
                        "switching to fallback IoU tracker for the rest of the session"
                    );
                    self.external = None;
                    self.mode = TrackerMode::Fallback;
                }
            }
        }

        self.fallback.update(&detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::target::ExternalTarget;

    struct Scripted {
        outputs: Vec<Result<Vec<ExternalTarget>, TrackerError>>,
        calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl ExternalTracker for Scripted {
        fn update(
            &mut self,
            _detections: &[Detection],
            _frame_size: Option<(u32, u32)>,
        ) -> Result<Vec<ExternalTarget>, TrackerError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if self.outputs.is_empty() {
                Ok(vec![])
            } else {
                self.outputs.remove(0)
            }
        }
    }

    #[test]
    fn test_external_output_is_normalized() {
        let external = Scripted {
            outputs: vec![Ok(vec![ExternalTarget::Tlwh {
                track_id: 42,
                tlwh: [1.0, 2.0, 3.0, 4.0],
            }])],
            calls: Default::default(),
        };
        let mut tracker =
            IdentityTracker::new("cam", Box::new(external), &TrackerSettings::default());
        let out = tracker.update(FrameIndex(1), &[Detection::new(1.0, 2.0, 4.0, 6.0, 0.9)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 42);
        assert_eq!(tracker.mode(), TrackerMode::External);
    }

    #[test]
    fn test_mismatch_switches_permanently() {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let external = Scripted {
            outputs: vec![Ok(vec![ExternalTarget::Row(vec![1.0, 2.0])])],
            calls: calls.clone(),
        };
        let mut tracker =
            IdentityTracker::new("cam", Box::new(external), &TrackerSettings::default());
        let det = [Detection::new(0.0, 0.0, 10.0, 10.0, 0.9)];

        let out = tracker.update(FrameIndex(1), &det);
        assert_eq!(tracker.mode(), TrackerMode::Fallback);
        // The failing frame is still served, by the fallback.
        assert_eq!(out.len(), 1);

        tracker.update(FrameIndex(2), &det);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_degenerate_target_dropped_without_switching() {
        let external = Scripted {
            outputs: vec![Ok(vec![
                ExternalTarget::Tlbr {
                    track_id: 5,
                    tlbr: [0.0, 0.0, 10.0, 10.0],
                },
                ExternalTarget::Tlbr {
                    track_id: 6,
                    tlbr: [50.0, 50.0, 60.0, 50.0],
                },
            ])],
            calls: Default::default(),
        };
        let mut tracker =
            IdentityTracker::new("cam", Box::new(external), &TrackerSettings::default());
        let out = tracker.update(
            FrameIndex(1),
            &[
                Detection::new(0.0, 0.0, 10.0, 10.0, 0.9),
                Detection::new(50.0, 50.0, 60.0, 52.0, 0.9),
            ],
        );
        assert_eq!(tracker.mode(), TrackerMode::External);
        let ids: Vec<_> = out.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![5]);
    }

    #[test]
    fn test_invalid_and_low_score_detections_dropped() {
        let settings = TrackerSettings {
            min_score: 0.5,
            ..TrackerSettings::default()
        };
        let mut tracker = IdentityTracker::fallback_only("cam", &settings);
        let out = tracker.update(
            FrameIndex(1),
            &[
                Detection::new(0.0, 0.0, 10.0, 10.0, 0.9),
                Detection::new(50.0, 50.0, 40.0, 60.0, 0.9),
                Detection::new(100.0, 100.0, 120.0, 120.0, 0.2),
            ],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(tracker.last_frame(), Some(FrameIndex(1)));
    }
}
