use std::sync::Arc;

use ppe_sentinel::cache::SUPPRESSION_PREFIX;
use ppe_sentinel::{
    AlertCache, AlertRecord, CameraConfig, Clock, EngineConfig, FrameIndex, GridCell, ManualClock,
    MemoryTtlStore, Rect, StatusQuery, TrackId, ViolationEngine, ViolationObservation,
    ViolationStatus,
};

const CAMERA: &str = "dock-3";

/// One engine on an 800x800 frame (100px grid cells) ticking at 1 frame/s.
struct Camera {
    clock: ManualClock,
    store: Arc<MemoryTtlStore>,
    engine: ViolationEngine,
    frame: FrameIndex,
}

impl Camera {
    fn new() -> Self {
        let clock = ManualClock::new(1_700_000_000.0);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = Arc::new(MemoryTtlStore::new(shared.clone()));
        let cache = AlertCache::new(CAMERA, store.clone());
        let engine = ViolationEngine::new(
            &CameraConfig::new(CAMERA, 800, 800),
            &EngineConfig::default(),
            cache,
            shared,
        )
        .unwrap();
        Self {
            clock,
            store,
            engine,
            frame: FrameIndex::default(),
        }
    }

    /// Advance one tick and run both engine phases.
    fn tick(&mut self, observations: &[ViolationObservation]) -> Vec<AlertRecord> {
        if self.frame != FrameIndex::default() {
            self.clock.advance(1.0);
        }
        self.frame = self.frame.next();
        assert_eq!(self.engine.update_violations(self.frame, observations), 0);
        self.engine.check_and_generate_alerts()
    }

    fn suppression_ttl(&self, cell: GridCell) -> Option<f64> {
        self.store
            .ttl(&format!("{SUPPRESSION_PREFIX}{CAMERA}:{}:{}", cell.x, cell.y))
    }
}

fn no_gloves(identity: TrackId, x: f32, y: f32) -> ViolationObservation {
    ViolationObservation::new(
        identity,
        Rect::from_tlbr(x, y, x + 40.0, y + 120.0),
        vec!["gloves".into()],
    )
}

#[test]
fn test_alert_fires_when_both_thresholds_met() {
    let mut cam = Camera::new();
    let worker = no_gloves(7, 120.0, 110.0);

    for tick in 1..20 {
        assert!(cam.tick(&[worker.clone()]).is_empty(), "early alert on tick {tick}");
    }
    assert_eq!(
        cam.engine.get_status(StatusQuery::Identity(7)),
        Some(ViolationStatus::AwaitingFrames { remaining: 1 })
    );

    let alerts = cam.tick(&[worker.clone()]);
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.camera_id, CAMERA);
    assert_eq!(alert.identity, 7);
    assert_eq!(alert.grid_cell, GridCell::new(1, 1));
    assert_eq!(alert.missing_attributes, vec!["gloves".to_string()]);
    assert_eq!(alert.duration_seconds, 19.0);
    assert_eq!((alert.frame_width, alert.frame_height), (800, 800));

    assert!(cam.suppression_ttl(GridCell::new(1, 1)).is_some());
    assert_eq!(cam.engine.suppressed_cells(), vec![GridCell::new(1, 1)]);
    assert_eq!(cam.store.len(), 2);
    assert_eq!(
        cam.engine.get_status(StatusQuery::Identity(7)),
        Some(ViolationStatus::Alerted)
    );
}

#[test]
fn test_persisting_violation_alerts_once_and_keeps_cell_suppressed() {
    let mut cam = Camera::new();
    let worker = no_gloves(7, 120.0, 110.0);
    let mut alerts = Vec::new();
    for _ in 0..20 {
        alerts.extend(cam.tick(&[worker.clone()]));
    }
    assert_eq!(alerts.len(), 1);

    // 30 more seconds, longer than the 20 s suppression window.
    for _ in 0..30 {
        assert!(cam.tick(&[worker.clone()]).is_empty());
        let ttl = cam.suppression_ttl(GridCell::new(1, 1)).unwrap();
        assert!((ttl - 20.0).abs() < 1e-6, "suppression not renewed: {ttl}");
    }
    assert_eq!(
        cam.engine.get_status(StatusQuery::Identity(7)),
        Some(ViolationStatus::Alerted)
    );
    assert_eq!(cam.engine.record(7).unwrap().consecutive_frame_count, 50);
}

#[test]
fn test_gap_resets_streak() {
    let mut cam = Camera::new();
    let worker = no_gloves(3, 420.0, 500.0);

    for _ in 0..19 {
        assert!(cam.tick(&[worker.clone()]).is_empty());
    }
    // Tick 20: the identity is not reported.
    assert!(cam.tick(&[]).is_empty());
    assert!(cam.engine.record(3).is_none());

    // Tick 21: back, counting from one.
    assert!(cam.tick(&[worker.clone()]).is_empty());
    assert_eq!(cam.engine.record(3).unwrap().consecutive_frame_count, 1);

    for _ in 0..18 {
        assert!(cam.tick(&[worker.clone()]).is_empty());
    }
    assert_eq!(cam.engine.record(3).unwrap().consecutive_frame_count, 19);

    let alerts = cam.tick(&[worker.clone()]);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].identity, 3);
}

#[test]
fn test_shared_hash_blocks_second_identity_in_cell() {
    let mut cam = Camera::new();
    let first = no_gloves(11, 110.0, 105.0);
    let second = no_gloves(12, 140.0, 120.0);

    let mut alerts = Vec::new();
    for tick in 1..=30 {
        let mut observations = vec![first.clone()];
        if tick > 5 {
            observations.push(second.clone());
        }
        alerts.extend(cam.tick(&observations));
    }

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].identity, 11);
    // The second identity confirmed (tick 25) but was absorbed by the hash.
    assert_eq!(
        cam.engine.get_status(StatusQuery::Identity(12)),
        Some(ViolationStatus::Alerted)
    );
}

#[test]
fn test_simultaneous_confirmations_resolve_by_identity() {
    let mut cam = Camera::new();
    let a = no_gloves(21, 110.0, 105.0);
    let b = no_gloves(20, 150.0, 100.0);

    let mut alerts = Vec::new();
    for _ in 0..20 {
        alerts.extend(cam.tick(&[a.clone(), b.clone()]));
    }
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].identity, 20);
}

#[test]
fn test_other_cells_are_not_suppressed() {
    let mut cam = Camera::new();
    let left = no_gloves(1, 110.0, 105.0);
    let right = no_gloves(2, 610.0, 105.0);

    let mut alerts = Vec::new();
    for _ in 0..20 {
        alerts.extend(cam.tick(&[left.clone(), right.clone()]));
    }
    let mut cells: Vec<GridCell> = alerts.iter().map(|a| a.grid_cell).collect();
    cells.sort();
    assert_eq!(cells, vec![GridCell::new(1, 1), GridCell::new(6, 1)]);
}

#[test]
fn test_alerted_record_lingers_then_expires() {
    let mut cam = Camera::new();
    let worker = no_gloves(5, 120.0, 110.0);
    for _ in 0..20 {
        cam.tick(&[worker.clone()]);
    }

    for _ in 0..20 {
        cam.tick(&[]);
    }
    assert!(cam.engine.record(5).is_some());

    cam.tick(&[]);
    assert!(cam.engine.record(5).is_none());
    assert!(cam.engine.is_empty());
}

#[test]
fn test_store_outage_fails_open() {
    let mut cam = Camera::new();
    cam.store.set_online(false);
    let first = no_gloves(1, 110.0, 105.0);
    let second = no_gloves(2, 140.0, 120.0);

    let mut alerts = Vec::new();
    for _ in 0..20 {
        alerts.extend(cam.tick(&[first.clone(), second.clone()]));
    }

    // Without the store there is neither dedup nor suppression.
    assert_eq!(alerts.len(), 2);
    assert!(cam.engine.suppressed_cells().is_empty());

    cam.store.set_online(true);
    assert!(cam.store.is_empty());
}
