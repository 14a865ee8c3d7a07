//! Alert records and the sinks that consume them.
//!
//! Persistence and notification are not handled here. A sink takes ownership
//! of each record and must not block the frame loop. [`ChannelSink`] hands
//! records to another thread for anything expensive.

use std::path::PathBuf;
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::tracker::{Rect, TrackId};
use crate::violation::GridCell;

/// One confirmed, deduplicated violation notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub camera_id: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub grid_cell: GridCell,
    pub identity: TrackId,
    /// Sorted.
    pub missing_attributes: Vec<String>,
    /// Serialized as `[x1, y1, x2, y2]`.
    #[serde(rename = "box", with = "tlbr")]
    pub bbox: Rect,
    /// How long the violation persisted before the alert.
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_tag: Option<String>,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl AlertRecord {
    /// Attach the path of a saved crop or frame.
    pub fn with_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = Some(path.into());
        self
    }
}

mod tlbr {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::tracker::Rect;

    pub fn serialize<S: Serializer>(rect: &Rect, serializer: S) -> Result<S::Ok, S::Error> {
        rect.to_tlbr().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Rect, D::Error> {
        let [x1, y1, x2, y2] = <[f32; 4]>::deserialize(deserializer)?;
        Ok(Rect::from_tlbr(x1, y1, x2, y2))
    }
}

/// Fire-and-forget consumer of alerts. No acknowledgement is expected.
pub trait AlertSink: Send {
    fn deliver(&mut self, alert: AlertRecord);
}

/// Writes each alert as a structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn deliver(&mut self, alert: AlertRecord) {
        info!(
            camera = %alert.camera_id,
            identity = alert.identity,
            cell = %alert.grid_cell,
            missing = ?alert.missing_attributes,
            duration = alert.duration_seconds,
            zone = alert.location_tag.as_deref().unwrap_or("-"),
            "ppe violation alert"
        );
    }
}

/// Forwards alerts to another thread.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<AlertRecord>,
}

impl ChannelSink {
    /// Forward into `tx`.
    pub fn new(tx: Sender<AlertRecord>) -> Self {
        Self { tx }
    }
}

impl AlertSink for ChannelSink {
    fn deliver(&mut self, alert: AlertRecord) {
        if let Err(err) = self.tx.send(alert) {
            let alert = err.0;
            warn!(
                camera = %alert.camera_id,
                identity = alert.identity,
                cell = %alert.grid_cell,
                "alert receiver gone, alert not forwarded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn sample() -> AlertRecord {
        AlertRecord {
            camera_id: "cam".into(),
            timestamp: 1_700_000_000.0,
            grid_cell: GridCell::new(1, 2),
            identity: 7,
            missing_attributes: vec!["gloves".into()],
            bbox: Rect::from_tlbr(0.0, 0.0, 10.0, 20.0),
            duration_seconds: 19.0,
            image_path: None,
            location_tag: None,
            frame_width: 640,
            frame_height: 480,
        }
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample().with_image_path("crops/7.jpg")).unwrap();
        assert_eq!(json["box"], serde_json::json!([0.0, 0.0, 10.0, 20.0]));
        assert_eq!(json["grid_cell"]["y"], 2);
        assert_eq!(json["image_path"], "crops/7.jpg");
        assert!(json.get("location_tag").is_none());
    }

    #[test]
    fn test_box_read_back_from_corners() {
        let alert: AlertRecord = serde_json::from_value(serde_json::json!({
            "camera_id": "cam",
            "timestamp": 1.0,
            "grid_cell": {"x": 0, "y": 0},
            "identity": 3,
            "missing_attributes": ["vest"],
            "box": [5.0, 10.0, 25.0, 50.0],
            "duration_seconds": 15.0,
            "frame_width": 640,
            "frame_height": 480
        }))
        .unwrap();
        assert_eq!(alert.bbox, Rect::new(5.0, 10.0, 20.0, 40.0));
        assert!(alert.image_path.is_none());
    }

    #[test]
    fn test_channel_sink_forwards() {
        let (tx, rx) = mpsc::channel();
        let mut sink = ChannelSink::new(tx);
        sink.deliver(sample());
        assert_eq!(rx.recv().unwrap().identity, 7);

        drop(rx);
        // Receiver gone: logged, not a panic.
        sink.deliver(sample());
    }
}
