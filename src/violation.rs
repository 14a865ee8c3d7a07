//! Violation confirmation, deduplication and suppression.

mod engine;
mod grid;
mod record;
mod status;

pub use engine::ViolationEngine;
pub use grid::{Grid, GridCell};
pub use record::{ViolationHash, ViolationObservation, ViolationRecord};
pub use status::{StatusQuery, ViolationStatus};
