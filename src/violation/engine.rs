//! Per-identity violation state and the alert decision.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::alert::AlertRecord;
use crate::cache::AlertCache;
use crate::clock::Clock;
use crate::config::{CameraConfig, EngineConfig};
use crate::error::ConfigError;
use crate::tracker::{FrameIndex, TrackId};
use crate::violation::grid::{Grid, GridCell};
use crate::violation::record::{Streak, ViolationHash, ViolationObservation, ViolationRecord};
use crate::violation::status::{StatusQuery, ViolationStatus};

/// Violation engine for one camera, exclusively owned by its worker.
///
/// Call [`update_violations`] then [`check_and_generate_alerts`] exactly once
/// per frame, in that order.
///
/// [`update_violations`]: ViolationEngine::update_violations
/// [`check_and_generate_alerts`]: ViolationEngine::check_and_generate_alerts
pub struct ViolationEngine {
    camera_id: String,
    frame_width: u32,
    frame_height: u32,
    config: EngineConfig,
    grid: Grid,
    cache: AlertCache,
    clock: Arc<dyn Clock>,
    records: HashMap<TrackId, ViolationRecord>,
    current_frame: Option<FrameIndex>,
}

impl ViolationEngine {
    /// Build the engine for `camera`. Fails if either config is invalid or
    /// `cache` was built for another camera.
    pub fn new(
        camera: &CameraConfig,
        config: &EngineConfig,
        cache: AlertCache,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        camera.validate()?;
        config.validate()?;
        if cache.camera_id() != camera.id {
            return Err(ConfigError::invalid(
                "cameras.id",
                format!(
                    "alert cache belongs to `{}`, not `{}`",
                    cache.camera_id(),
                    camera.id
                ),
            ));
        }
        let grid = Grid::new(config.grid_size, camera.frame_width, camera.frame_height)?;
        Ok(Self {
            camera_id: camera.id.clone(),
            frame_width: camera.frame_width,
            frame_height: camera.frame_height,
            config: config.clone(),
            grid,
            cache,
            clock,
            records: HashMap::new(),
            current_frame: None,
        })
    }

    /// Camera this engine belongs to.
    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    /// Suppression grid derived from the frame size.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// The dedup and suppression cache.
    pub fn cache(&self) -> &AlertCache {
        &self.cache
    }

    /// Fold this frame's violating identities into the per-identity records.
    ///
    /// Identities missing from `observations` lose their record at once unless
    /// they already alerted; alerted records linger for
    /// `suppression_reset_seconds` after they were last seen. Malformed
    /// observations are logged and skipped. Returns how many were skipped.
    pub fn update_violations(
        &mut self,
        frame: FrameIndex,
        observations: &[ViolationObservation],
    ) -> usize {
        let now = self.clock.now();
        if let Some(current) = self.current_frame
            && frame <= current
        {
            warn!(camera = %self.camera_id, frame = %frame, last = %current, "frame index did not increase");
        }
        self.current_frame = Some(frame);

        let mut dropped = 0;
        let valid: Vec<&ViolationObservation> = observations
            .iter()
            .filter(|obs| match obs.validate() {
                Ok(()) => true,
                Err(err) => {
                    warn!(
                        camera = %self.camera_id,
                        identity = obs.identity,
                        error = %err,
                        "dropping malformed violation observation"
                    );
                    dropped += 1;
                    false
                }
            })
            .collect();

        let active: HashSet<TrackId> = valid.iter().map(|obs| obs.identity).collect();
        let retention = self.config.suppression_reset_seconds;
        let camera_id = &self.camera_id;
        self.records.retain(|identity, record| {
            if active.contains(identity) {
                return true;
            }
            if !record.alerted {
                debug!(camera = %camera_id, identity, frames = record.consecutive_frame_count, "identity absent, dropping unalerted violation");
                return false;
            }
            now - record.last_seen <= retention
        });

        for obs in valid {
            let cell = self.grid.cell_for_box(&obs.bbox);
            match self.records.entry(obs.identity) {
                Entry::Vacant(slot) => {
                    debug!(
                        camera = %self.camera_id,
                        identity = obs.identity,
                        cell = %cell,
                        missing = ?obs.missing_attributes,
                        zone = obs.location_tag.as_deref().unwrap_or("-"),
                        frame = %frame,
                        "new violation"
                    );
                    slot.insert(ViolationRecord::new(
                        now,
                        frame,
                        obs,
                        cell,
                        self.config.recent_boxes,
                    ));
                }
                Entry::Occupied(mut slot) => {
                    let last = slot.get().last_seen_frame_index;
                    if slot.get_mut().observe(now, frame, obs, cell) == Streak::Reset {
                        debug!(
                            camera = %self.camera_id,
                            identity = obs.identity,
                            gap = frame.0.saturating_sub(last.0),
                            "violation streak reset after a gap"
                        );
                    }
                }
            }
        }
        dropped
    }

    /// Decide which records alert this frame.
    pub fn check_and_generate_alerts(&mut self) -> Vec<AlertRecord> {
        let now = self.clock.now();
        let suppression_ttl = self.config.suppression_ttl();
        let hash_ttl = self.config.hash_ttl();

        // Lowest identity first, so simultaneous confirmations resolve deterministically.
        let mut identities: Vec<TrackId> = self.records.keys().copied().collect();
        identities.sort_unstable();

        let mut alerts = Vec::new();
        for identity in identities {
            let Some(record) = self.records.get_mut(&identity) else {
                continue;
            };
            let cell = record.grid_cell;

            if record.alerted {
                // Keep the cell quiet while an alerted violation is still in view.
                if Some(record.last_seen_frame_index) == self.current_frame
                    && !self.cache.renew(cell, suppression_ttl)
                {
                    self.cache.suppress(cell, suppression_ttl);
                }
                continue;
            }

            let elapsed = record.elapsed(now);
            if !is_confirmed(&self.config, record, now) {
                trace!(
                    camera = %self.camera_id,
                    identity,
                    frames = record.consecutive_frame_count,
                    elapsed,
                    "violation not confirmed yet"
                );
                continue;
            }

            let hash = ViolationHash::new(&self.camera_id, cell, &record.missing_attributes);
            if self.cache.is_alerted(&hash) {
                if self.cache.is_suppressed(cell) {
                    self.cache.renew(cell, suppression_ttl);
                }
                record.alerted = true;
                debug!(camera = %self.camera_id, identity, hash = %hash, "duplicate violation, alert skipped");
                continue;
            }

            if self.cache.is_suppressed(cell) {
                self.cache.renew(cell, suppression_ttl);
                record.alerted = true;
                debug!(camera = %self.camera_id, identity, cell = %cell, "cell suppressed, alert skipped");
                continue;
            }

            let alert = AlertRecord {
                camera_id: self.camera_id.clone(),
                timestamp: now,
                grid_cell: cell,
                identity,
                missing_attributes: record.missing(),
                bbox: record.bbox,
                duration_seconds: elapsed,
                image_path: None,
                location_tag: record.location_tag.clone(),
                frame_width: self.frame_width,
                frame_height: self.frame_height,
            };
            info!(
                camera = %self.camera_id,
                identity,
                cell = %cell,
                frames = record.consecutive_frame_count,
                elapsed,
                missing = ?alert.missing_attributes,
                "violation confirmed, raising alert"
            );
            self.cache.mark_alerted(&hash, hash_ttl);
            self.cache.suppress(cell, suppression_ttl);
            record.alerted = true;
            alerts.push(alert);
        }
        alerts
    }

    /// Status of a violation by identity, by pixel, or identity then pixel.
    /// `None` when nothing matches.
    pub fn get_status(&self, query: StatusQuery) -> Option<ViolationStatus> {
        let now = self.clock.now();
        let record = match query {
            StatusQuery::Identity(identity) => self.records.get(&identity),
            StatusQuery::Point { x, y } => self.pending_in_cell(self.grid.cell_for_point(x, y)),
            StatusQuery::IdentityOrPoint { identity, x, y } => self
                .records
                .get(&identity)
                .or_else(|| self.pending_in_cell(self.grid.cell_for_point(x, y))),
        }?;
        Some(status_of(&self.config, record, now))
    }

    fn pending_in_cell(&self, cell: GridCell) -> Option<&ViolationRecord> {
        self.records
            .iter()
            .filter(|(_, r)| !r.alerted && r.grid_cell == cell)
            .min_by_key(|(id, _)| **id)
            .map(|(_, r)| r)
    }

    /// Violation record of `identity`, alerted or not.
    pub fn record(&self, identity: TrackId) -> Option<&ViolationRecord> {
        self.records.get(&identity)
    }

    /// All live records, in no particular order.
    pub fn records(&self) -> impl Iterator<Item = (&TrackId, &ViolationRecord)> {
        self.records.iter()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cells holding a violation that has not alerted.
    pub fn violation_cells(&self) -> Vec<GridCell> {
        let mut cells: Vec<GridCell> = self
            .records
            .values()
            .filter(|r| !r.alerted)
            .map(|r| r.grid_cell)
            .collect();
        cells.sort();
        cells.dedup();
        cells
    }

    /// Cells currently under suppression, sorted. Empty while the store is
    /// unreachable.
    pub fn suppressed_cells(&self) -> Vec<GridCell> {
        self.cache.list_suppressed()
    }
}

/// Both thresholds must hold at once.
fn is_confirmed(config: &EngineConfig, record: &ViolationRecord, now: f64) -> bool {
    record.consecutive_frame_count >= config.min_consecutive_frames
        && record.elapsed(now) >= config.debounce_seconds
}

fn status_of(config: &EngineConfig, record: &ViolationRecord, now: f64) -> ViolationStatus {
    if record.alerted {
        return ViolationStatus::Alerted;
    }
    let remaining = config
        .min_consecutive_frames
        .saturating_sub(record.consecutive_frame_count);
    if remaining > 0 {
        return ViolationStatus::AwaitingFrames { remaining };
    }
    let remaining_seconds = config.debounce_seconds - record.elapsed(now);
    if remaining_seconds > 0.0 {
        return ViolationStatus::AwaitingTime { remaining_seconds };
    }
    ViolationStatus::Active
}
