//! urg-io - SCIP 2.0 client for Hokuyo/URG laser range finders
//!
//! This library owns the link to one or more sensors: it encodes requests,
//! decodes replies and scans, and keeps each device session alive on
//! background threads while the consumer polls it once per frame.
//!
//! ## Layout
//!
//! - [`scip`]: wire codec (6-bit values, checksums, reply assembly)
//! - [`transport`]: TCP, serial and in-memory links
//! - [`device`]: connection lifecycle, reader thread, event queue
//! - [`sim`]: a SCIP sensor served over local TCP for tests and demos

pub mod config;
pub mod device;
pub mod error;
pub mod scan;
pub mod scip;
pub mod sim;
pub mod transport;

// Re-export commonly used types
pub use config::{DeviceConfig, MeasurementMode, ScanEncoding, TransportConfig};
pub use device::{DeviceEvent, DeviceStats, UrgDevice};
pub use error::{Error, Result};
pub use scan::ScanFrame;
pub use scip::{ParameterInfo, ScanRange, StatusInfo, VersionInfo};
