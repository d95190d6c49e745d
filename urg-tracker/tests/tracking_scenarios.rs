//! Scan → detector → tracker scenarios on synthetic UST-10LX scans

use approx::assert_relative_eq;
use std::sync::Arc;
use std::time::{Duration, Instant};
use urg_io::{ParameterInfo, ScanFrame};
use urg_tracker::ObjectEvent;
use urg_tracker::detection::{CropMethod, DetectionConfig, ObjectDetector, SensorMount};
use urg_tracker::geometry::Rect;
use urg_tracker::mapper::CoordinateMapper;
use urg_tracker::scan_buffer::{ScanBuffer, ScanGeometry};
use urg_tracker::tracking::{ObjectTracker, TrackingConfig};

const FRAME: Duration = Duration::from_millis(25);
const BACKGROUND: u32 = 30000;

struct Rig {
    buffer: ScanBuffer,
    detector: ObjectDetector,
    tracker: ObjectTracker,
    now: Instant,
    timestamp: u32,
}

impl Rig {
    fn new(geometry: ScanGeometry, tracking: TrackingConfig) -> Self {
        Self::with_detection(geometry, tracking, DetectionConfig::default())
    }

    fn with_detection(
        geometry: ScanGeometry,
        tracking: TrackingConfig,
        detection: DetectionConfig,
    ) -> Self {
        let mapper = CoordinateMapper::new(
            detection.crop.detect_rect(),
            Rect::new(0.0, 0.0, 1920.0, 1080.0),
        );
        let now = Instant::now();
        let mut buffer = ScanBuffer::new(geometry);
        let mut detector = ObjectDetector::new(detection);
        let parameters = ParameterInfo::default();
        buffer.set_parameters(&parameters);
        detector.set_parameters(&parameters);
        Self {
            buffer,
            detector,
            tracker: ObjectTracker::new(tracking, mapper, now),
            now,
            timestamp: 0,
        }
    }

    /// Feed one scan with the given `(first, last, distance)` runs
    fn frame(&mut self, objects: &[(usize, usize, u32)]) -> Vec<ObjectEvent> {
        let mut distances = vec![BACKGROUND; 1081];
        for &(first, last, distance) in objects {
            for d in &mut distances[first..=last] {
                *d = distance;
            }
        }
        self.now += FRAME;
        self.timestamp += FRAME.as_millis() as u32;
        self.buffer
            .refresh(Arc::new(ScanFrame::from_distances(self.timestamp, distances)));
        let raws = self
            .detector
            .detect(self.buffer.distances(), self.buffer.directions());
        self.tracker.update(raws, self.now)
    }
}

fn tracking() -> TrackingConfig {
    TrackingConfig {
        smooth_time: 0.0,
        denoise_time_ms: 0,
        ..TrackingConfig::default()
    }
}

fn kinds(events: &[ObjectEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.kind()).collect()
}

#[test]
fn thirty_sample_run_is_one_object_straight_ahead() {
    // Area x in [-63.0, 67.5]: a wall at 1m is inside for steps 525..=554 only
    let detection = DetectionConfig {
        crop: CropMethod::Rect {
            mount: SensorMount::Bottom,
            area: Rect::new(2.25, 0.0, 130.5, 3000.0),
        },
        ..DetectionConfig::default()
    };
    let mut rig = Rig::with_detection(ScanGeometry::default(), tracking(), detection);
    let events = rig.frame(&[(480, 599, 1000)]);

    assert_eq!(kinds(&events), vec!["added"]);
    let object = events[0].object();
    assert_relative_eq!(object.position.x, 0.0, epsilon = 1e-3);
    assert_relative_eq!(object.position.y, 1000.0, epsilon = 1e-3);
    assert_relative_eq!(object.screen_position.x, 63.0 / 130.5 * 1920.0, epsilon = 1e-2);
    assert_relative_eq!(object.screen_position.y, 360.0, epsilon = 1e-2);

    let raws = rig
        .detector
        .detect(rig.buffer.distances(), rig.buffer.directions());
    assert_eq!(raws.len(), 1);
    assert_eq!(raws[0].len(), 30);
}

#[test]
fn object_lifecycle_add_press_release_remove() {
    let config = tracking();
    let mut rig = Rig::new(ScanGeometry::default(), config);
    let mut all = Vec::new();

    for _ in 0..3 {
        all.extend(rig.frame(&[(525, 554, 1000)]));
    }
    for _ in 0..=(config.release_delay + config.remove_delay) {
        all.extend(rig.frame(&[]));
    }

    let lifecycle: Vec<_> = kinds(&all)
        .into_iter()
        .filter(|k| *k != "updated")
        .collect();
    assert_eq!(lifecycle, vec!["added", "pressed", "released", "removed"]);
    assert!(all.iter().all(|e| e.object().id == all[0].object().id));
    assert!(rig.tracker.objects().is_empty());
}

#[test]
fn moving_object_keeps_its_id() {
    let mut rig = Rig::new(ScanGeometry::default(), tracking());
    let first = rig.frame(&[(525, 554, 1000)]);
    let id = first[0].object().id;

    // Drift a few steps per frame, well inside the tracking distance
    let mut events = Vec::new();
    for shift in 1..6 {
        events.extend(rig.frame(&[(525 + shift * 2, 554 + shift * 2, 1000)]));
    }
    assert!(!events.iter().any(|e| matches!(e, ObjectEvent::Added(_))));
    assert!(events.iter().all(|e| e.object().id == id));
    let object = &rig.tracker.objects()[0];
    assert!(object.position.x < 0.0, "moved towards +step, which is -x");
}

#[test]
fn separate_objects_get_distinct_ids() {
    let mut rig = Rig::new(ScanGeometry::default(), tracking());
    let events = rig.frame(&[(440, 460, 900), (620, 640, 900)]);
    assert_eq!(kinds(&events), vec!["added", "added"]);
    assert_ne!(events[0].object().id, events[1].object().id);
    // Lower steps lie to the right of the sensor front
    assert!(events[0].object().position.x > 0.0);
    assert!(events[1].object().position.x < 0.0);
}

#[test]
fn flip_mirrors_positions() {
    let flipped = ScanGeometry {
        flip: true,
        ..ScanGeometry::default()
    };
    let mut plain = Rig::new(ScanGeometry::default(), tracking());
    let mut mirrored = Rig::new(flipped, tracking());

    let a = plain.frame(&[(440, 460, 900)]);
    let b = mirrored.frame(&[(440, 460, 900)]);
    assert_relative_eq!(a[0].object().position.x, -b[0].object().position.x, epsilon = 1e-2);
    assert_relative_eq!(a[0].object().position.y, b[0].object().position.y, epsilon = 1e-2);
}

#[test]
fn denoise_window_masks_static_background() {
    let config = TrackingConfig {
        denoise_time_ms: 100,
        ..tracking()
    };
    let mut rig = Rig::new(ScanGeometry::default(), config);

    // A pillar present while the window is open becomes noise
    let events = rig.frame(&[(600, 620, 1200)]);
    assert!(events.is_empty());
    assert!(rig.tracker.objects()[0].is_noise);

    // After the window it stays silent, but a new object is reported
    for _ in 0..5 {
        assert!(rig.frame(&[(600, 620, 1200)]).is_empty());
    }
    let events = rig.frame(&[(600, 620, 1200), (500, 520, 800)]);
    assert_eq!(kinds(&events), vec!["added"]);
    assert!(!events[0].object().is_noise);
}

#[test]
fn samples_outside_the_area_are_ignored() {
    let mut rig = Rig::new(ScanGeometry::default(), tracking());
    // 1600mm straight ahead is beyond the default 1500mm area height
    assert!(rig.frame(&[(525, 554, 1600)]).is_empty());
    assert!(rig.tracker.objects().is_empty());
}
