//! Decoded scan frames

use crate::scip::{CommandCode, ScanRange};

/// One decoded scan.
///
/// Built by the reader thread and handed to the consumer as an immutable
/// snapshot; a new frame replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanFrame {
    /// Command that produced the scan
    pub command: CommandCode,
    /// Sensor clock in milliseconds (wraps at 2^24)
    pub timestamp: u32,
    /// Distances in millimetres, one per (grouped) step
    pub distances: Vec<u32>,
    /// Reflection strengths, parallel to `distances`; empty when not requested
    pub strengths: Vec<u32>,
    /// Step window echoed by the sensor
    pub range: Option<ScanRange>,
}

impl ScanFrame {
    /// Number of samples in the scan
    pub fn step_count(&self) -> usize {
        self.distances.len()
    }

    pub fn has_strength(&self) -> bool {
        !self.strengths.is_empty()
    }

    /// Build a frame from raw distances, e.g. for replay or tests
    pub fn from_distances(timestamp: u32, distances: Vec<u32>) -> Self {
        Self {
            command: CommandCode::Gd,
            timestamp,
            distances,
            strengths: Vec::new(),
            range: None,
        }
    }
}
