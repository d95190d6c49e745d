//! Planar points and rectangles.
//!
//! Sensor space is millimetres with the sensor at the origin, +Y pointing
//! out of the sensor's front and angles counter-clockwise. Screen space is
//! whatever unit the configured screen rectangle uses.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// 2D point or vector
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Zero point (origin)
    pub const ZERO: Point2 = Point2 { x: 0.0, y: 0.0 };

    /// Unit vector at `angle` radians, counter-clockwise from +Y
    #[inline]
    pub fn from_heading(angle: f32) -> Self {
        Self::new(-angle.sin(), angle.cos())
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &Point2) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Squared distance (avoids sqrt)
    #[inline]
    pub fn distance_squared(&self, other: &Point2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[inline]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Polar angle in degrees, counter-clockwise from +X, in (-180, 180]
    #[inline]
    pub fn angle_degrees(&self) -> f32 {
        self.y.atan2(self.x).to_degrees()
    }
}

impl Add for Point2 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Point2::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point2 {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Point2::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f32> for Point2 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f32) -> Self {
        Point2::new(self.x * scalar, self.y * scalar)
    }
}

/// Axis-aligned rectangle given by its minimum corner and size
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanning two corners
    pub fn from_min_max(min: Point2, max: Point2) -> Self {
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    #[inline]
    pub fn min(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }

    #[inline]
    pub fn max(&self) -> Point2 {
        Point2::new(self.x + self.width, self.y + self.height)
    }

    #[inline]
    pub fn size(&self) -> Point2 {
        Point2::new(self.width, self.height)
    }

    pub fn center(&self) -> Point2 {
        Point2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Closed containment test
    #[inline]
    pub fn contains(&self, point: Point2) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// Zero (or negative) width or height
    pub fn is_degenerate(&self) -> bool {
        self.width.abs() <= f32::EPSILON || self.height.abs() <= f32::EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_heading_convention() {
        let front = Point2::from_heading(0.0);
        assert_relative_eq!(front.x, 0.0);
        assert_relative_eq!(front.y, 1.0);

        // Counter-clockwise quarter turn points left
        let left = Point2::from_heading(std::f32::consts::FRAC_PI_2);
        assert_relative_eq!(left.x, -1.0);
        assert_relative_eq!(left.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_point_ops() {
        let a = Point2::new(3.0, 4.0);
        assert_relative_eq!(a.length(), 5.0);
        assert_relative_eq!(a.distance(&Point2::ZERO), 5.0);
        assert_eq!(a - Point2::new(1.0, 1.0), Point2::new(2.0, 3.0));
        assert_eq!(a * 2.0, Point2::new(6.0, 8.0));
        assert_relative_eq!(Point2::new(0.0, 1.0).angle_degrees(), 90.0);
    }

    #[test]
    fn test_rect_contains_edges() {
        let rect = Rect::new(-10.0, 0.0, 20.0, 5.0);
        assert!(rect.contains(Point2::new(-10.0, 0.0)));
        assert!(rect.contains(Point2::new(10.0, 5.0)));
        assert!(!rect.contains(Point2::new(10.1, 2.0)));
        assert_eq!(rect.center(), Point2::new(0.0, 2.5));
        assert!(!rect.is_degenerate());
        assert!(Rect::new(0.0, 0.0, 0.0, 4.0).is_degenerate());
    }
}
