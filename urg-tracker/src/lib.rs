//! urg-tracker: turns URG laser scans into tracked objects
//!
//! Each configured sensor gets a [`SensorPipeline`]: scans from
//! [`urg_io::UrgDevice`] are clustered into raw objects by the
//! [`ObjectDetector`](detection::ObjectDetector), followed across frames by
//! the [`ObjectTracker`](tracking::ObjectTracker), mapped onto a screen
//! rectangle and reported to [`ObjectListener`]s as
//! `Added`/`Pressed`/`Updated`/`Released`/`Removed` events.

pub mod config;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod mapper;
pub mod pipeline;
pub mod scan_buffer;
pub mod streaming;
pub mod tracking;

pub use config::{SensorConfig, TrackerConfig};
pub use error::{Result, TrackerError, TrackerError as Error};
pub use pipeline::{LoggingListener, ObjectListener, SensorPipeline};
pub use tracking::{ObjectEvent, TrackedObject};
