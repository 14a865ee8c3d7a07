use std::collections::BTreeMap;

use crate::config::CameraConfig;

/// Which attributes a person must wear, by location tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributePolicy {
    default_required: Vec<String>,
    by_zone: BTreeMap<String, Vec<String>>,
}

impl AttributePolicy {
    /// Policy with one list for every location.
    pub fn new(default_required: Vec<String>) -> Self {
        Self {
            default_required,
            by_zone: BTreeMap::new(),
        }
    }

    /// Policy from a camera's default list and zone overrides.
    pub fn from_camera(camera: &CameraConfig) -> Self {
        Self {
            default_required: camera.required_attributes.clone(),
            by_zone: camera.zone_requirements.clone(),
        }
    }

    /// Override the required list inside zone `tag`.
    pub fn with_zone(mut self, tag: impl Into<String>, required: Vec<String>) -> Self {
        self.by_zone.insert(tag.into(), required);
        self
    }

    /// Zone-specific list if the tag has one, the camera default otherwise.
    pub fn required_for(&self, location_tag: Option<&str>) -> &[String] {
        location_tag
            .and_then(|tag| self.by_zone.get(tag))
            .unwrap_or(&self.default_required)
    }
}
