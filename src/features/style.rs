//! Visual style record carried by every feature.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_FONT_SIZE, DEFAULT_STROKE_WIDTH};

use super::{Feature, Geometry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    pub stroke_color: [f32; 4],
    pub stroke_width: f32,
    pub fill_color: Option<[f32; 4]>,
    pub font_size: f32,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            stroke_color: [1.0, 0.0, 0.0, 1.0],
            stroke_width: DEFAULT_STROKE_WIDTH,
            fill_color: None,
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

/// Partial style edit; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StylePatch {
    pub stroke_color: Option<[f32; 4]>,
    pub stroke_width: Option<f32>,
    pub fill_color: Option<Option<[f32; 4]>>,
    pub font_size: Option<f32>,
    /// Polygon smoothing; ignored by other kinds
    pub smooth: Option<bool>,
}

impl StylePatch {
    pub fn apply_to(&self, feature: &mut Feature) {
        let style = &mut feature.style;
        if let Some(color) = self.stroke_color {
            style.stroke_color = color;
        }
        if let Some(width) = self.stroke_width {
            style.stroke_width = width.max(0.0);
        }
        if let Some(fill) = self.fill_color {
            style.fill_color = fill;
        }
        if let Some(size) = self.font_size {
            style.font_size = size.max(1.0);
        }
        if let (Some(smooth), Geometry::Polygon(polygon)) = (self.smooth, &mut feature.geometry) {
            polygon.smooth = smooth;
        }
    }
}
