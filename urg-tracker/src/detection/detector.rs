//! Raw object detection

use super::area::CropMethod;
use crate::geometry::Point2;
use serde::{Deserialize, Serialize};
use urg_io::ParameterInfo;

/// Sensors with more steps per revolution than this need twice the samples
const HIGH_RESOLUTION_AREA_TOTAL: u32 = 1440;

/// Clustering parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub crop: CropMethod,
    /// Largest distance jump (mm) between neighbouring samples of one object
    pub detection_delta: u32,
    /// Minimum samples per object, before `noise_rate` scaling
    pub detection_noise: u32,
    /// Multiplier on `detection_noise`; derived from the sensor resolution when unset
    pub noise_rate: Option<u32>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            crop: CropMethod::default(),
            detection_delta: 100,
            detection_noise: 5,
            noise_rate: None,
        }
    }
}

/// One cluster of one scan
#[derive(Debug, Clone, PartialEq)]
pub struct RawObject {
    /// Sample indices, in scan order
    pub steps: Vec<usize>,
    /// Distances (mm), parallel to `steps`
    pub distances: Vec<u32>,
    pub median_step: usize,
    pub median_distance: u32,
    /// Sensor-space position of the median sample (mm)
    pub position: Point2,
    /// Chord between the first and last sample (mm)
    pub size: f32,
    /// Polar angle of the median direction (degrees)
    pub heading: f32,
}

impl RawObject {
    fn from_cluster(steps: Vec<usize>, distances: Vec<u32>, directions: &[Point2]) -> Self {
        // Middle of the list, not a sorted median
        let mid = steps.len() / 2;
        let median_step = steps[mid];
        let median_distance = distances[mid];
        let direction = directions[median_step];

        let first = directions[steps[0]] * distances[0] as f32;
        let last_index = steps.len() - 1;
        let last = directions[steps[last_index]] * distances[last_index] as f32;

        Self {
            median_step,
            median_distance,
            position: direction * median_distance as f32,
            size: first.distance(&last),
            heading: direction.angle_degrees(),
            steps,
            distances,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Turns scans into raw objects
#[derive(Debug, Clone)]
pub struct ObjectDetector {
    config: DetectionConfig,
    /// Samples below the sensor's minimum distance are error codes
    min_distance: u32,
    area_total: u32,
}

impl ObjectDetector {
    pub fn new(config: DetectionConfig) -> Self {
        let defaults = ParameterInfo::default();
        Self {
            config,
            min_distance: defaults.min_distance,
            area_total: defaults.area_total,
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Adopt the connected sensor's distance floor and resolution
    pub fn set_parameters(&mut self, parameters: &ParameterInfo) {
        self.min_distance = parameters.min_distance;
        if parameters.area_total > 0 {
            self.area_total = parameters.area_total;
        }
    }

    pub fn noise_rate(&self) -> u32 {
        self.config.noise_rate.unwrap_or_else(|| {
            if self.area_total > HIGH_RESOLUTION_AREA_TOTAL {
                2
            } else {
                1
            }
        })
    }

    /// Clusters shorter than this are dropped
    pub fn min_samples(&self) -> usize {
        (self.config.detection_noise * self.noise_rate()) as usize
    }

    /// Cluster one scan.
    ///
    /// A sample is a member when it lies inside the area and both
    /// neighbours are within `detection_delta`; any other sample closes the
    /// open cluster. The first and last samples only serve as neighbours.
    pub fn detect(&self, distances: &[u32], directions: &[Point2]) -> Vec<RawObject> {
        let n = distances.len().min(directions.len());
        if n < 3 {
            return Vec::new();
        }

        let delta = self.config.detection_delta;
        let min_samples = self.min_samples().max(1);
        let mut objects = Vec::new();
        let mut steps: Vec<usize> = Vec::new();
        let mut dists: Vec<u32> = Vec::new();

        let mut close = |steps: &mut Vec<usize>, dists: &mut Vec<u32>| {
            if steps.len() >= min_samples {
                objects.push(RawObject::from_cluster(
                    std::mem::take(steps),
                    std::mem::take(dists),
                    directions,
                ));
            } else {
                steps.clear();
                dists.clear();
            }
        };

        for i in 1..n - 1 {
            let d = distances[i];
            let delta_a = d.abs_diff(distances[i - 1]);
            let delta_b = distances[i + 1].abs_diff(d);
            let inside = d >= self.min_distance && self.config.crop.contains(d, directions[i]);

            if inside && delta_a < delta && delta_b < delta {
                steps.push(i);
                dists.push(d);
            } else {
                close(&mut steps, &mut dists);
            }
        }
        close(&mut steps, &mut dists);

        log::trace!("Detected {} raw objects in {} samples", objects.len(), n);
        objects
    }
}
