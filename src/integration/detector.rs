//! Per-frame input from the external detector and zone evaluator.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::tracker::Detection;

/// Raw PPE flags for one person box, as reported by the external
/// attribute detector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeReport {
    /// attribute name -> observed present
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    /// Optional per-attribute confidence. Missing entries default to 0.5.
    #[serde(default)]
    pub confidences: HashMap<String, f32>,
    /// Zone the person stands in, if the zone evaluator found one.
    #[serde(default)]
    pub location_tag: Option<String>,
    /// False when the person is outside every monitored region.
    #[serde(default = "default_true")]
    pub monitored: bool,
}

fn default_true() -> bool {
    true
}

/// One detected person and the attributes evaluated inside its box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonObservation {
    pub detection: Detection,
    #[serde(default)]
    pub attributes: AttributeReport,
}

/// Source of frames for a camera worker.
///
/// Implement this to connect any detection pipeline to a worker.
///
/// # Example
///
/// ```ignore
/// use ppe_sentinel::{FrameSource, PersonObservation};
///
/// struct MyFeed { /* detector + zone evaluator */ }
///
/// impl FrameSource for MyFeed {
///     type Error = std::io::Error;
///
///     fn next_frame(&mut self) -> Result<Option<Vec<PersonObservation>>, Self::Error> {
///         // Grab a frame, run inference, evaluate attributes per person
///         Ok(Some(vec![]))
///     }
/// }
/// ```
pub trait FrameSource {
    /// Error type for acquisition or inference failures.
    type Error: std::fmt::Display;

    /// Persons detected in the next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Vec<PersonObservation>>, Self::Error>;
}

impl<I> FrameSource for I
where
    I: Iterator<Item = Vec<PersonObservation>>,
{
    type Error = std::convert::Infallible;

    fn next_frame(&mut self) -> Result<Option<Vec<PersonObservation>>, Self::Error> {
        Ok(self.next())
    }
}
