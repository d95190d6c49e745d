//! Detection area: which samples may belong to an object

use crate::geometry::{Point2, Rect};
use serde::{Deserialize, Serialize};

/// Which edge of the detection rectangle the sensor sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorMount {
    /// Sensor below the area, looking up (+Y)
    #[default]
    Bottom,
    /// Sensor above the area; the area lies behind the sensor front
    Top,
    /// Sensor at the left edge; the area extends to +X
    Left,
    /// Sensor at the right edge; the area extends to -X
    Right,
}

/// Crop applied to every sample before clustering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum CropMethod {
    /// Keep samples inside a rectangle placed relative to the sensor.
    ///
    /// `area.width`/`area.height` give the size, `area.x`/`area.y` the
    /// offset from the mount position (mm).
    Rect { mount: SensorMount, area: Rect },
    /// Keep samples whose distance lies in `[min, max]` (mm)
    Radius { min: f32, max: f32 },
}

impl Default for CropMethod {
    fn default() -> Self {
        CropMethod::Rect {
            mount: SensorMount::Bottom,
            area: Rect::new(0.0, 0.0, 2000.0, 1500.0),
        }
    }
}

impl CropMethod {
    /// Sensor-space rectangle covered by this crop.
    ///
    /// For radius cropping this is the square `[-max, max]²`.
    pub fn detect_rect(&self) -> Rect {
        match *self {
            CropMethod::Rect { mount, area } => {
                let (w, h) = (area.width, area.height);
                let (ox, oy) = (area.x, area.y);
                match mount {
                    SensorMount::Bottom => Rect::new(-w / 2.0 + ox, oy, w, h),
                    SensorMount::Top => Rect::new(-w / 2.0 + ox, -oy - h, w, h),
                    SensorMount::Left => Rect::new(ox, -h / 2.0 + oy, w, h),
                    SensorMount::Right => Rect::new(-ox - w, -h / 2.0 + oy, w, h),
                }
            }
            CropMethod::Radius { max, .. } => Rect::new(-max, -max, 2.0 * max, 2.0 * max),
        }
    }

    /// Whether a sample at `distance` along `direction` is inside the area
    #[inline]
    pub fn contains(&self, distance: u32, direction: Point2) -> bool {
        match *self {
            CropMethod::Rect { .. } => self
                .detect_rect()
                .contains(direction * distance as f32),
            CropMethod::Radius { min, max } => {
                let d = distance as f32;
                d >= min && d <= max
            }
        }
    }
}
