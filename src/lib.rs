//! Turns noisy per-frame person detections into confirmed, deduplicated and
//! rate-limited PPE violation alerts.
//!
//! One [`CameraPipeline`] is built per camera. Each frame flows through the
//! identity tracker, the attribute debouncer and the violation engine, which
//! consults a shared [`TtlStore`] for deduplication and per-cell suppression.

pub mod alert;
pub mod cache;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod error;
pub mod integration;
pub mod tracker;
pub mod violation;

pub use alert::{AlertRecord, AlertSink, ChannelSink, LogSink};
pub use cache::{AlertCache, MemoryTtlStore, TtlStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AttributeConfig, CameraConfig, EngineConfig, SentinelConfig, TrackerSettings,
};
pub use debounce::{AttributeDebouncer, AttributeState, Debounced};
pub use error::{ConfigError, ObservationError, StoreError, TrackerError};
pub use integration::{
    AttributePolicy, AttributeReport, CameraPipeline, CameraWorker, FrameOutcome, FrameSource,
    PersonBuilder, PersonObservation, WorkerReport,
};
pub use tracker::{
    Detection, ExternalTarget, ExternalTracker, FrameIndex, IdentityTracker, IouTracker, Rect,
    TrackId, TrackedIdentity, TrackerMode,
};
pub use violation::{
    GridCell, StatusQuery, ViolationEngine, ViolationHash, ViolationObservation, ViolationRecord,
    ViolationStatus,
};
