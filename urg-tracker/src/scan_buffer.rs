//! Latest scan plus the direction of every sample.
//!
//! The direction table maps sample index to a unit vector in sensor space.
//! It depends only on the configured angular window and the sensor's step
//! geometry (`PP`), so it is rebuilt when either changes and otherwise
//! shared read-only by the detector and tracker.

use crate::geometry::Point2;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::sync::Arc;
use urg_io::{ParameterInfo, ScanFrame, ScanRange};

/// Configured angular window of one sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanGeometry {
    /// Window start, degrees from the sensor front (counter-clockwise positive)
    pub start_degree: f32,
    /// Window end, degrees from the sensor front
    pub end_degree: f32,
    /// Rotation applied to every direction, degrees
    pub rotate_degree: f32,
    /// Mirror the scan (sensor mounted upside down)
    pub flip: bool,
    /// Adjacent steps merged into one sample; taken from the device config
    #[serde(skip)]
    pub group_size: u32,
}

impl Default for ScanGeometry {
    fn default() -> Self {
        Self {
            start_degree: -135.0,
            end_degree: 135.0,
            rotate_degree: 0.0,
            flip: false,
            group_size: 1,
        }
    }
}

/// Unit direction per sample
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionTable {
    pub start_step: u32,
    pub end_step: u32,
    pub group_size: u32,
    directions: Vec<Point2>,
}

impl DirectionTable {
    /// Build the table for `geometry` on a sensor described by `params`.
    pub fn compute(geometry: &ScanGeometry, params: &ParameterInfo) -> Self {
        let area_total = params.area_total.max(1) as f64;
        let to_step = |degree: f32| {
            let offset = (degree as f64 * area_total / 360.0).round() as i64;
            (params.front_step as i64 + offset).clamp(params.min_step as i64, params.max_step as i64)
                as u32
        };
        let a = to_step(geometry.start_degree);
        let b = to_step(geometry.end_degree);
        Self::from_steps(a.min(b), a.max(b), geometry, params)
    }

    /// Build the table for an explicit step window.
    pub fn from_steps(
        start_step: u32,
        end_step: u32,
        geometry: &ScanGeometry,
        params: &ParameterInfo,
    ) -> Self {
        let group_size = geometry.group_size.clamp(1, 99);
        let area_total = params.area_total.max(1) as f64;
        let front = params.front_step as f64;
        let rotate = (geometry.rotate_degree as f64).to_radians();
        let count = ScanRange::new(start_step, end_step, group_size).sample_count();

        let mut directions: Vec<Point2> = (0..count)
            .map(|i| {
                let step = start_step as f64 + (i as u32 * group_size) as f64;
                let angle = (step - front) * TAU / area_total + rotate;
                Point2::new(-angle.sin() as f32, angle.cos() as f32)
            })
            .collect();
        if geometry.flip {
            directions.reverse();
        }

        Self {
            start_step,
            end_step,
            group_size,
            directions,
        }
    }

    pub fn step_count(&self) -> usize {
        self.directions.len()
    }

    pub fn directions(&self) -> &[Point2] {
        &self.directions
    }

    /// Request window matching this table
    pub fn scan_range(&self) -> ScanRange {
        ScanRange::new(self.start_step, self.end_step, self.group_size)
    }
}

/// Holds the newest scan and the table that interprets it
#[derive(Debug, Clone)]
pub struct ScanBuffer {
    geometry: ScanGeometry,
    parameters: ParameterInfo,
    table: Arc<DirectionTable>,
    frame: Option<Arc<ScanFrame>>,
    resyncs: u64,
}

impl ScanBuffer {
    /// Buffer using default sensor parameters until the sensor reports its own
    pub fn new(geometry: ScanGeometry) -> Self {
        let parameters = ParameterInfo::default();
        let table = Arc::new(DirectionTable::compute(&geometry, &parameters));
        Self {
            geometry,
            parameters,
            table,
            frame: None,
            resyncs: 0,
        }
    }

    /// Rebuild the direction table.
    ///
    /// Identical inputs produce an identical table.
    pub fn recalculate(&mut self, geometry: ScanGeometry, parameters: &ParameterInfo) {
        self.geometry = geometry;
        if parameters.is_valid() {
            self.parameters = parameters.clone();
        } else {
            log::warn!("Ignoring sensor parameters without step geometry");
        }
        self.table = Arc::new(DirectionTable::compute(&self.geometry, &self.parameters));
        log::debug!(
            "Direction table: steps {}..{} group {} ({} samples)",
            self.table.start_step,
            self.table.end_step,
            self.table.group_size,
            self.table.step_count()
        );
    }

    /// Adopt new sensor parameters, keeping the configured window
    pub fn set_parameters(&mut self, parameters: &ParameterInfo) {
        self.recalculate(self.geometry, parameters);
    }

    /// Install a new scan.
    ///
    /// A scan whose length does not match the table triggers a rebuild; if
    /// the configured window still disagrees the table follows the scan.
    pub fn refresh(&mut self, frame: Arc<ScanFrame>) {
        let samples = frame.step_count();
        if samples != self.table.step_count() {
            self.resyncs += 1;
            let parameters = self.parameters.clone();
            self.recalculate(self.geometry, &parameters);

            if samples != self.table.step_count() {
                let (start, group) = match frame.range {
                    Some(range) => (range.start_step, range.group_size),
                    None => (self.table.start_step, self.table.group_size),
                };
                let end = start + (samples.saturating_sub(1) as u32) * group;
                let geometry = ScanGeometry {
                    group_size: group,
                    ..self.geometry
                };
                log::warn!(
                    "Scan has {} samples, expected {}; using steps {}..{}",
                    samples,
                    self.table.step_count(),
                    start,
                    end
                );
                self.table = Arc::new(DirectionTable::from_steps(
                    start,
                    end,
                    &geometry,
                    &self.parameters,
                ));
            }
        }
        self.frame = Some(frame);
    }

    pub fn clear(&mut self) {
        self.frame = None;
    }

    pub fn frame(&self) -> Option<&Arc<ScanFrame>> {
        self.frame.as_ref()
    }

    pub fn distances(&self) -> &[u32] {
        self.frame.as_ref().map_or(&[], |f| f.distances.as_slice())
    }

    pub fn strengths(&self) -> &[u32] {
        self.frame.as_ref().map_or(&[], |f| f.strengths.as_slice())
    }

    pub fn table(&self) -> &Arc<DirectionTable> {
        &self.table
    }

    pub fn directions(&self) -> &[Point2] {
        self.table.directions()
    }

    pub fn geometry(&self) -> &ScanGeometry {
        &self.geometry
    }

    pub fn parameters(&self) -> &ParameterInfo {
        &self.parameters
    }

    /// Number of length-mismatch rebuilds so far
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ust() -> ParameterInfo {
        ParameterInfo::default()
    }

    #[test]
    fn test_full_window_steps() {
        let table = DirectionTable::compute(&ScanGeometry::default(), &ust());
        assert_eq!(table.start_step, 0);
        assert_eq!(table.end_step, 1080);
        assert_eq!(table.step_count(), 1081);

        // Middle sample looks straight ahead
        let front = table.directions()[540];
        assert_relative_eq!(front.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(front.y, 1.0, epsilon = 1e-6);
        // First sample is 135 degrees clockwise from front
        let first = table.directions()[0];
        assert_relative_eq!(first.x, (135f32).to_radians().sin(), epsilon = 1e-5);
        assert_relative_eq!(first.y, (135f32).to_radians().cos(), epsilon = 1e-5);
    }

    #[test]
    fn test_window_clamped_to_sensor_range() {
        let geometry = ScanGeometry {
            start_degree: -180.0,
            end_degree: 10.0,
            group_size: 3,
            ..ScanGeometry::default()
        };
        let table = DirectionTable::compute(&geometry, &ust());
        assert_eq!(table.start_step, 0);
        assert_eq!(table.end_step, 580);
        assert_eq!(table.step_count(), 580 / 3 + 1);
        assert_eq!(table.scan_range(), ScanRange::new(0, 580, 3));
    }

    #[test]
    fn test_recalculate_is_idempotent() {
        let geometry = ScanGeometry {
            start_degree: -45.5,
            end_degree: 60.25,
            rotate_degree: 12.5,
            flip: true,
            group_size: 2,
        };
        let a = DirectionTable::compute(&geometry, &ust());
        let b = DirectionTable::compute(&geometry, &ust());
        assert_eq!(a, b);

        let mut buffer = ScanBuffer::new(geometry);
        let first = buffer.table().clone();
        buffer.recalculate(geometry, &ust());
        assert_eq!(*first, **buffer.table());
    }

    #[test]
    fn test_flip_reverses_order() {
        let geometry = ScanGeometry {
            start_degree: -90.0,
            end_degree: 45.0,
            ..ScanGeometry::default()
        };
        let plain = DirectionTable::compute(&geometry, &ust());
        let flipped = DirectionTable::compute(
            &ScanGeometry {
                flip: true,
                ..geometry
            },
            &ust(),
        );
        let mut reversed = plain.directions().to_vec();
        reversed.reverse();
        assert_eq!(flipped.directions(), reversed.as_slice());
    }

    #[test]
    fn test_rotation_offsets_directions() {
        let geometry = ScanGeometry {
            start_degree: 0.0,
            end_degree: 0.0,
            rotate_degree: 90.0,
            ..ScanGeometry::default()
        };
        let table = DirectionTable::compute(&geometry, &ust());
        assert_eq!(table.step_count(), 1);
        assert_relative_eq!(table.directions()[0].x, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_refresh_resyncs_on_length_mismatch() {
        let geometry = ScanGeometry {
            start_degree: -10.0,
            end_degree: 10.0,
            ..ScanGeometry::default()
        };
        let mut buffer = ScanBuffer::new(geometry);
        assert_eq!(buffer.directions().len(), 81);

        buffer.refresh(Arc::new(ScanFrame::from_distances(0, vec![1000; 81])));
        assert_eq!(buffer.resyncs(), 0);
        assert_eq!(buffer.distances().len(), 81);

        buffer.refresh(Arc::new(ScanFrame::from_distances(1, vec![1000; 50])));
        assert_eq!(buffer.resyncs(), 1);
        assert_eq!(buffer.directions().len(), 50);
        assert_eq!(buffer.table().start_step, 500);
        assert_eq!(buffer.table().end_step, 549);
    }

    #[test]
    fn test_invalid_parameters_keep_previous_geometry() {
        let mut buffer = ScanBuffer::new(ScanGeometry::default());
        let broken = ParameterInfo {
            area_total: 0,
            ..ParameterInfo::default()
        };
        buffer.set_parameters(&broken);
        assert_eq!(buffer.directions().len(), 1081);
    }
}
