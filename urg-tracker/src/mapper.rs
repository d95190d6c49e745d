//! Sensor space to screen space

use crate::geometry::{Point2, Rect};

/// Affine map of `sensor_position` from `detection_area` onto `screen_area`.
///
/// A degenerate detection area maps everything to the screen origin.
pub fn to_screen(sensor_position: Point2, detection_area: &Rect, screen_area: &Rect) -> Point2 {
    if detection_area.is_degenerate() {
        return screen_area.min();
    }
    let u = (sensor_position.x - detection_area.x) / detection_area.width;
    let v = (sensor_position.y - detection_area.y) / detection_area.height;
    Point2::new(
        screen_area.x + screen_area.width * u,
        screen_area.y + screen_area.height * v,
    )
}

/// Fixed detection → screen mapping of one sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    detection_area: Rect,
    screen_area: Rect,
}

impl CoordinateMapper {
    pub fn new(detection_area: Rect, screen_area: Rect) -> Self {
        if detection_area.is_degenerate() {
            log::warn!("Detection area {:?} has no extent; all objects map to the screen origin", detection_area);
        }
        Self {
            detection_area,
            screen_area,
        }
    }

    pub fn detection_area(&self) -> &Rect {
        &self.detection_area
    }

    pub fn screen_area(&self) -> &Rect {
        &self.screen_area
    }

    #[inline]
    pub fn to_screen(&self, sensor_position: Point2) -> Point2 {
        to_screen(sensor_position, &self.detection_area, &self.screen_area)
    }

    /// Map a position and report its screen delta from `previous`
    /// (zero without a previous position).
    pub fn map(&self, sensor_position: Point2, previous: Option<Point2>) -> (Point2, Point2) {
        let screen = self.to_screen(sensor_position);
        let delta = previous.map_or(Point2::ZERO, |p| screen - p);
        (screen, delta)
    }
}
