//! Error types shared across the crate.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::tracker::TrackId;

/// Invalid or unreadable configuration. Fatal for the camera being built.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failure talking to the expiring key-value store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("ttl store unavailable: {0}")]
    Unavailable(String),

    #[error("ttl store call timed out after {0:?}")]
    Timeout(Duration),
}

/// A single per-tick observation that cannot be used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    #[error("invalid box [{x1}, {y1}, {x2}, {y2}]")]
    InvalidBox { x1: f32, y1: f32, x2: f32, y2: f32 },

    #[error("identity {0} reported an empty attribute name")]
    EmptyAttributeName(TrackId),

    #[error("identity {identity} reported non-finite confidence for `{attribute}`")]
    InvalidConfidence { identity: TrackId, attribute: String },
}

/// The external tracker returned something the adapter cannot interpret.
#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    #[error("tracker protocol mismatch: {0}")]
    Protocol(String),
}
