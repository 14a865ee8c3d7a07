//! Wiring the components into a per-camera frame loop.
//!
//! This module connects an external detection feed to the tracker, the
//! attribute debouncer and the violation engine, and runs one worker
//! thread per camera.

mod builder;
mod detector;
mod pipeline;
mod policy;
mod worker;

pub use builder::PersonBuilder;
pub use detector::{AttributeReport, FrameSource, PersonObservation};
pub use pipeline::{CameraPipeline, FrameOutcome};
pub use policy::AttributePolicy;
pub use worker::{CameraWorker, WorkerReport};
