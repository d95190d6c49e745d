//! Scan clustering
//!
//! Splits one scan into raw objects: runs of adjacent samples inside the
//! detection area whose distances change by less than `detection_delta`
//! from sample to sample.

mod area;
mod detector;

pub use area::{CropMethod, SensorMount};
pub use detector::{DetectionConfig, ObjectDetector, RawObject};
