//! Tracked objects and their lifecycle events

use crate::geometry::Point2;
use serde::Serialize;
use std::time::Instant;

/// An object followed across frames
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedObject {
    /// Monotonic per tracker, never reused
    pub id: u64,
    #[serde(skip)]
    pub born_at: Instant,
    /// Time since first detection at the last update (ms)
    pub age_ms: u64,
    /// Smoothed sensor-space position (mm)
    pub position: Point2,
    /// Unsmoothed position of the last match (mm)
    pub raw_position: Point2,
    /// Change of `position` in the last update (mm)
    pub delta: Point2,
    /// Smoothing filter velocity (mm/s)
    pub velocity: Point2,
    pub screen_position: Point2,
    pub screen_delta: Point2,
    pub pressed: bool,
    pub expired: bool,
    pub is_noise: bool,
    /// Consecutive matched frames
    pub keeping_count: u32,
    /// Consecutive unmatched frames
    pub missing_count: u32,
    /// Chord of the last matched cluster (mm)
    pub size: f32,
    /// Polar angle of the last matched cluster (degrees)
    pub heading: f32,
    #[serde(skip)]
    pub(crate) last_update: Instant,
}

/// Lifecycle event with a snapshot of the object at that moment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "object", rename_all = "lowercase")]
pub enum ObjectEvent {
    Added(TrackedObject),
    Pressed(TrackedObject),
    Updated(TrackedObject),
    Released(TrackedObject),
    Removed(TrackedObject),
}

impl ObjectEvent {
    pub fn object(&self) -> &TrackedObject {
        match self {
            ObjectEvent::Added(o)
            | ObjectEvent::Pressed(o)
            | ObjectEvent::Updated(o)
            | ObjectEvent::Released(o)
            | ObjectEvent::Removed(o) => o,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ObjectEvent::Added(_) => "added",
            ObjectEvent::Pressed(_) => "pressed",
            ObjectEvent::Updated(_) => "updated",
            ObjectEvent::Released(_) => "released",
            ObjectEvent::Removed(_) => "removed",
        }
    }
}
