use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tracker::Rect;

/// One cell of the per-camera N x N partition of the frame.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GridCell {
    pub x: u32,
    pub y: u32,
}

impl GridCell {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Maps pixel coordinates to grid cells. Fixed for the camera session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    size: u32,
    frame_width: f32,
    frame_height: f32,
}

impl Grid {
    /// `size` x `size` grid over a `frame_width` x `frame_height` frame.
    pub fn new(size: u32, frame_width: u32, frame_height: u32) -> Result<Self, ConfigError> {
        if size == 0 {
            return Err(ConfigError::invalid("engine.grid_size", "must be at least 1"));
        }
        if frame_width == 0 || frame_height == 0 {
            return Err(ConfigError::invalid(
                "frame_width/frame_height",
                "frame dimensions must be positive",
            ));
        }
        Ok(Self {
            size,
            frame_width: frame_width as f32,
            frame_height: frame_height as f32,
        })
    }

    /// Cells per side.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Points outside the frame clamp to the border cells.
    pub fn cell_for_point(&self, x: f32, y: f32) -> GridCell {
        GridCell {
            x: self.axis(x, self.frame_width),
            y: self.axis(y, self.frame_height),
        }
    }

    /// Cell containing the center of `bbox`.
    pub fn cell_for_box(&self, bbox: &Rect) -> GridCell {
        let (cx, cy) = bbox.center();
        self.cell_for_point(cx, cy)
    }

    fn axis(&self, v: f32, extent: f32) -> u32 {
        let idx = (v / extent * self.size as f32).floor();
        if idx.is_nan() || idx < 0.0 {
            0
        } else {
            (idx as u32).min(self.size - 1)
        }
    }
}
