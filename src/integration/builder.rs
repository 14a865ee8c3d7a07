//! Builder for [`PersonObservation`]s.

use crate::integration::detector::{AttributeReport, PersonObservation};
use crate::tracker::Detection;

/// Fluent construction of a person observation.
#[derive(Debug, Clone, Default)]
pub struct PersonBuilder {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    report: AttributeReport,
}

impl PersonBuilder {
    /// Create a new builder. The person is monitored unless told otherwise.
    pub fn new() -> Self {
        Self {
            score: 1.0,
            report: AttributeReport {
                monitored: true,
                ..AttributeReport::default()
            },
            ..Self::default()
        }
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.x1 = cx - w / 2.0;
        self.y1 = cy - h / 2.0;
        self.x2 = cx + w / 2.0;
        self.y2 = cy + h / 2.0;
        self
    }

    /// Set the person detection confidence.
    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    /// Record an attribute observation without a confidence.
    pub fn attribute(mut self, name: impl Into<String>, present: bool) -> Self {
        self.report.flags.insert(name.into(), present);
        self
    }

    /// Record an attribute observation with its confidence.
    pub fn attribute_with_confidence(
        mut self,
        name: impl Into<String>,
        present: bool,
        confidence: f32,
    ) -> Self {
        let name = name.into();
        self.report.confidences.insert(name.clone(), confidence);
        self.report.flags.insert(name, present);
        self
    }

    /// Set the location tag the person stands in.
    pub fn zone(mut self, tag: impl Into<String>) -> Self {
        self.report.location_tag = Some(tag.into());
        self
    }

    /// Mark the person as outside every monitored region.
    pub fn unmonitored(mut self) -> Self {
        self.report.monitored = false;
        self
    }

    /// Build the observation.
    pub fn build(self) -> PersonObservation {
        PersonObservation {
            detection: Detection::new(self.x1, self.y1, self.x2, self.y2, self.score),
            attributes: self.report,
        }
    }
}
