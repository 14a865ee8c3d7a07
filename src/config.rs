//! Configuration surface, loaded once at construction.
//!
//! ```toml
//! [engine]
//! debounce_seconds = 15.0
//! min_consecutive_frames = 20
//!
//! [[cameras]]
//! id = "dock-1"
//! frame_width = 1920
//! frame_height = 1080
//! required_attributes = ["helmet", "vest"]
//!
//! [cameras.zone_requirements]
//! welding = ["helmet", "gloves"]
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_REQUIRED_ATTRIBUTES: [&str; 4] = ["helmet", "gloves", "ear_protection", "vest"];

/// Violation confirmation, deduplication and suppression parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum elapsed time of a violation streak before it may alert.
    pub debounce_seconds: f64,
    /// Minimum contiguous frames of a violation streak before it may alert.
    pub min_consecutive_frames: u32,
    /// TTL of a cell's suppression entry, and retention of alerted records.
    pub suppression_reset_seconds: f64,
    /// TTL of a violation hash in the dedup key space.
    pub hash_ttl_seconds: f64,
    /// The frame is partitioned into `grid_size` x `grid_size` cells.
    pub grid_size: u32,
    /// Capacity of a record's recent box history.
    pub recent_boxes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_seconds: 15.0,
            min_consecutive_frames: 20,
            suppression_reset_seconds: 20.0,
            hash_ttl_seconds: 60.0,
            grid_size: 8,
            recent_boxes: 16,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_seconds("engine.debounce_seconds", self.debounce_seconds)?;
        positive_seconds(
            "engine.suppression_reset_seconds",
            self.suppression_reset_seconds,
        )?;
        positive_seconds("engine.hash_ttl_seconds", self.hash_ttl_seconds)?;
        if self.min_consecutive_frames == 0 {
            return Err(ConfigError::invalid(
                "engine.min_consecutive_frames",
                "must be at least 1",
            ));
        }
        if self.grid_size == 0 {
            return Err(ConfigError::invalid("engine.grid_size", "must be at least 1"));
        }
        if self.recent_boxes == 0 {
            return Err(ConfigError::invalid("engine.recent_boxes", "must be at least 1"));
        }
        Ok(())
    }

    /// Suppression TTL as a [`Duration`].
    pub fn suppression_ttl(&self) -> Duration {
        Duration::from_secs_f64(self.suppression_reset_seconds)
    }

    /// Dedup hash TTL as a [`Duration`].
    pub fn hash_ttl(&self) -> Duration {
        Duration::from_secs_f64(self.hash_ttl_seconds)
    }
}

/// Attribute debouncer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeConfig {
    /// Release window for a previously confirmed attribute. Never-confirmed
    /// attributes use half of it.
    pub debounce_seconds: f64,
    /// Identities not updated for this long are forgotten.
    pub stale_after_seconds: f64,
}

impl Default for AttributeConfig {
    fn default() -> Self {
        Self {
            debounce_seconds: 8.0,
            stale_after_seconds: 60.0,
        }
    }
}

impl AttributeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_seconds("attributes.debounce_seconds", self.debounce_seconds)?;
        positive_seconds("attributes.stale_after_seconds", self.stale_after_seconds)
    }
}

/// Fallback IoU tracker and detection filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    pub iou_threshold: f32,
    pub max_age: u32,
    pub min_score: f32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            max_age: 30,
            min_score: 0.0,
        }
    }
}

impl TrackerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "tracker.iou_threshold",
                "must be in (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(ConfigError::invalid("tracker.min_score", "must be in [0, 1]"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub id: String,
    pub frame_width: u32,
    pub frame_height: u32,
    #[serde(default = "default_required_attributes")]
    pub required_attributes: Vec<String>,
    /// Location tag -> required attributes inside that zone.
    #[serde(default)]
    pub zone_requirements: BTreeMap<String, Vec<String>>,
}

impl CameraConfig {
    /// Camera with the default required attributes and no zones.
    pub fn new(id: impl Into<String>, frame_width: u32, frame_height: u32) -> Self {
        Self {
            id: id.into(),
            frame_width,
            frame_height,
            required_attributes: default_required_attributes(),
            zone_requirements: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::invalid("cameras.id", "must not be empty"));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(ConfigError::invalid(
                format!("cameras[{}].frame_width/frame_height", self.id),
                "frame dimensions must be positive",
            ));
        }
        Ok(())
    }
}

fn default_required_attributes() -> Vec<String> {
    DEFAULT_REQUIRED_ATTRIBUTES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub engine: EngineConfig,
    pub attributes: AttributeConfig,
    pub tracker: TrackerSettings,
    pub cameras: Vec<CameraConfig>,
}

impl SentinelConfig {
    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_toml_str(&raw)?;
        Ok(cfg)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate every section and reject duplicate camera ids.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.attributes.validate()?;
        self.tracker.validate()?;
        let mut seen = HashSet::new();
        for camera in &self.cameras {
            camera.validate()?;
            if !seen.insert(camera.id.as_str()) {
                return Err(ConfigError::invalid(
                    "cameras.id",
                    format!("duplicate camera id `{}`", camera.id),
                ));
            }
        }
        Ok(())
    }

    /// Camera settings by id.
    pub fn camera(&self, id: &str) -> Option<&CameraConfig> {
        self.cameras.iter().find(|c| c.id == id)
    }
}

/// Positive and representable as a [`Duration`].
fn positive_seconds(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::invalid(field, format!("must be positive, got {value}")));
    }
    Duration::try_from_secs_f64(value)
        .map(|_| ())
        .map_err(|_| ConfigError::invalid(field, format!("{value} seconds is out of range")))
}
