//! CameraPipeline: one camera's tracker, debouncer and violation engine.

use std::sync::Arc;

use tracing::warn;

use crate::alert::AlertRecord;
use crate::cache::{AlertCache, TtlStore};
use crate::clock::Clock;
use crate::config::{CameraConfig, SentinelConfig};
use crate::debounce::AttributeDebouncer;
use crate::error::ConfigError;
use crate::integration::detector::{AttributeReport, PersonObservation};
use crate::integration::policy::AttributePolicy;
use crate::tracker::{
    Detection, ExternalTracker, FrameIndex, IdentityTracker, Rect, TrackedIdentity,
};
use crate::violation::{StatusQuery, ViolationEngine, ViolationObservation, ViolationStatus};

/// Result of one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutcome {
    pub frame: FrameIndex,
    pub identities: Vec<TrackedIdentity>,
    /// Identities in violation this frame, with their missing attributes.
    pub violations: Vec<ViolationObservation>,
    pub alerts: Vec<AlertRecord>,
    /// Observations dropped as malformed.
    pub dropped: usize,
}

/// Runs the per-frame data flow for one camera:
/// detections → tracker → debouncer → policy → violation engine → alerts.
///
/// The pipeline owns the camera's single frame counter and hands the same
/// index to the tracker and the engine, so streak contiguity matches what the
/// tracker saw.
pub struct CameraPipeline {
    camera_id: String,
    tracker: IdentityTracker,
    debouncer: AttributeDebouncer,
    policy: AttributePolicy,
    engine: ViolationEngine,
    frame: FrameIndex,
}

impl CameraPipeline {
    /// Build a pipeline for `camera_id` from the loaded configuration, using
    /// the fallback IoU tracker.
    pub fn new(
        config: &SentinelConfig,
        camera_id: &str,
        store: Arc<dyn TtlStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let camera = config.camera(camera_id).ok_or_else(|| {
            ConfigError::invalid("cameras.id", format!("unknown camera `{camera_id}`"))
        })?;
        let tracker = IdentityTracker::fallback_only(&camera.id, &config.tracker)
            .with_frame_size(camera.frame_height, camera.frame_width);
        Self::with_tracker(config, camera, tracker, store, clock)
    }

    /// Like [`CameraPipeline::new`] but normalizing an external tracker.
    pub fn with_external_tracker(
        config: &SentinelConfig,
        camera_id: &str,
        external: Box<dyn ExternalTracker>,
        store: Arc<dyn TtlStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let camera = config.camera(camera_id).ok_or_else(|| {
            ConfigError::invalid("cameras.id", format!("unknown camera `{camera_id}`"))
        })?;
        let tracker = IdentityTracker::new(&camera.id, external, &config.tracker)
            .with_frame_size(camera.frame_height, camera.frame_width);
        Self::with_tracker(config, camera, tracker, store, clock)
    }

    fn with_tracker(
        config: &SentinelConfig,
        camera: &CameraConfig,
        tracker: IdentityTracker,
        store: Arc<dyn TtlStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let debouncer = AttributeDebouncer::new(&config.attributes, clock.clone())?;
        let cache = AlertCache::new(&camera.id, store);
        let engine = ViolationEngine::new(camera, &config.engine, cache, clock)?;
        Ok(Self {
            camera_id: camera.id.clone(),
            tracker,
            debouncer,
            policy: AttributePolicy::from_camera(camera),
            engine,
            frame: FrameIndex::default(),
        })
    }

    /// Camera this pipeline serves.
    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    /// Index of the last processed frame.
    pub fn frame(&self) -> FrameIndex {
        self.frame
    }

    /// The identity tracker.
    pub fn tracker(&self) -> &IdentityTracker {
        &self.tracker
    }

    /// The attribute debouncer.
    pub fn debouncer(&self) -> &AttributeDebouncer {
        &self.debouncer
    }

    /// The violation engine.
    pub fn engine(&self) -> &ViolationEngine {
        &self.engine
    }

    /// Shorthand for [`ViolationEngine::get_status`].
    pub fn status(&self, query: StatusQuery) -> Option<ViolationStatus> {
        self.engine.get_status(query)
    }

    /// Process one frame of person observations.
    pub fn process_frame(&mut self, persons: &[PersonObservation]) -> FrameOutcome {
        self.frame = self.frame.next();
        let frame = self.frame;

        let detections: Vec<Detection> = persons.iter().map(|p| p.detection).collect();
        let identities = self.tracker.update(frame, &detections);

        let mut dropped = 0;
        let mut violations = Vec::new();
        for identity in &identities {
            let Some(report) = best_report(&identity.bbox, persons) else {
                continue;
            };
            if !report.monitored {
                continue;
            }
            let debounced =
                match self
                    .debouncer
                    .update(identity.id, &report.flags, &report.confidences)
                {
                    Ok(values) => values,
                    Err(err) => {
                        warn!(camera = %self.camera_id, identity = identity.id, error = %err, "dropping attribute report");
                        dropped += 1;
                        continue;
                    }
                };

            let tag = report.location_tag.as_deref();
            let missing: Vec<String> = self
                .policy
                .required_for(tag)
                .iter()
                .filter(|attr| debounced.get(attr.as_str()).is_some_and(|v| v.is_absent()))
                .cloned()
                .collect();
            if missing.is_empty() {
                continue;
            }

            let mut obs = ViolationObservation::new(identity.id, identity.bbox, missing);
            obs.location_tag = report.location_tag.clone();
            violations.push(obs);
        }

        dropped += self.engine.update_violations(frame, &violations);
        let alerts = self.engine.check_and_generate_alerts();
        self.debouncer.prune_stale();

        FrameOutcome {
            frame,
            identities,
            violations,
            alerts,
            dropped,
        }
    }
}

/// The report whose detection box overlaps `bbox` the most.
fn best_report<'a>(bbox: &Rect, persons: &'a [PersonObservation]) -> Option<&'a AttributeReport> {
    persons
        .iter()
        .map(|p| (bbox.iou(&p.detection.bbox), &p.attributes))
        .filter(|(iou, _)| *iou > 0.0)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, report)| report)
}
