//! Frame-to-frame object tracker

use super::object::{ObjectEvent, TrackedObject};
use super::smoothing::smooth_damp_point;
use crate::detection::RawObject;
use crate::geometry::Point2;
use crate::mapper::CoordinateMapper;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Tracking parameters. Delays are in frames (ticks).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Largest frame-to-frame movement still matched to the same object (mm)
    pub tracking_distance: f32,
    /// Position smoothing time constant (s); 0 disables smoothing
    pub smooth_time: f32,
    /// Denoise window after start and after every `start_denoise` (ms)
    pub denoise_time_ms: u64,
    /// Match radius of noise objects (mm)
    pub denoise_block_size: f32,
    pub press_delay: u32,
    pub update_delay: u32,
    pub release_delay: u32,
    pub remove_delay: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_distance: 300.0,
            smooth_time: 0.05,
            denoise_time_ms: 1000,
            denoise_block_size: 100.0,
            press_delay: 1,
            update_delay: 0,
            release_delay: 1,
            remove_delay: 5,
        }
    }
}

impl TrackingConfig {
    pub fn denoise_time(&self) -> Duration {
        Duration::from_millis(self.denoise_time_ms)
    }
}

/// Matches raw objects to tracked objects and emits lifecycle events
#[derive(Debug)]
pub struct ObjectTracker {
    config: TrackingConfig,
    mapper: CoordinateMapper,
    objects: Vec<TrackedObject>,
    next_id: u64,
    denoise_until: Option<Instant>,
}

impl ObjectTracker {
    /// New tracker whose denoise window opens at `now`
    pub fn new(config: TrackingConfig, mapper: CoordinateMapper, now: Instant) -> Self {
        let mut tracker = Self {
            config,
            mapper,
            objects: Vec::new(),
            next_id: 1,
            denoise_until: None,
        };
        tracker.start_denoise(now);
        tracker
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn set_mapper(&mut self, mapper: CoordinateMapper) {
        self.mapper = mapper;
    }

    /// Live objects, noise included
    pub fn objects(&self) -> &[TrackedObject] {
        &self.objects
    }

    /// Live objects that produce events
    pub fn active_objects(&self) -> impl Iterator<Item = &TrackedObject> {
        self.objects.iter().filter(|o| !o.is_noise)
    }

    /// Reopen the denoise window; current noise objects are discarded.
    pub fn start_denoise(&mut self, now: Instant) {
        self.objects.retain(|o| !o.is_noise);
        self.denoise_until = Some(now + self.config.denoise_time());
        log::debug!("Denoise window open for {:?}", self.config.denoise_time());
    }

    pub fn is_denoising(&self, now: Instant) -> bool {
        self.denoise_until.is_some_and(|until| now < until)
    }

    /// Drop every object, reporting `Removed` for those that were surfaced.
    pub fn clear(&mut self) -> Vec<ObjectEvent> {
        self.objects
            .drain(..)
            .filter(|o| !o.is_noise)
            .map(ObjectEvent::Removed)
            .collect()
    }

    /// Advance one frame with this scan's raw objects.
    pub fn update(&mut self, raws: Vec<RawObject>, now: Instant) -> Vec<ObjectEvent> {
        let config = self.config;
        let mapper = self.mapper;
        let mut pool: Vec<Option<RawObject>> = raws.into_iter().map(Some).collect();
        let mut events = Vec::new();

        for object in &mut self.objects {
            let threshold = if object.is_noise {
                config.denoise_block_size
            } else {
                config.tracking_distance
            };

            let nearest = pool
                .iter()
                .enumerate()
                .filter_map(|(i, raw)| {
                    raw.as_ref()
                        .map(|r| (i, r.position.distance(&object.position)))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1));

            let event = match nearest {
                Some((index, distance)) if distance <= threshold => {
                    let Some(raw) = pool[index].take() else {
                        continue;
                    };
                    track_matched(object, &raw, &config, &mapper, now)
                }
                _ => track_missing(object, &config),
            };

            if let Some(event) = event
                && !object.is_noise
            {
                events.push(event(object.clone()));
            }
        }

        let mut removed = Vec::new();
        self.objects.retain(|o| {
            if o.expired && !o.is_noise {
                removed.push(ObjectEvent::Removed(o.clone()));
                false
            } else {
                true
            }
        });
        events.extend(removed);

        let denoising = self.is_denoising(now);
        for raw in pool.into_iter().flatten() {
            let object = self.spawn(&raw, denoising, now);
            if !object.is_noise {
                events.push(ObjectEvent::Added(object.clone()));
                if object.pressed {
                    events.push(ObjectEvent::Pressed(object.clone()));
                }
            }
            self.objects.push(object);
        }

        for event in &events {
            log::trace!("Object {} {}", event.object().id, event.kind());
        }
        events
    }

    fn spawn(&mut self, raw: &RawObject, is_noise: bool, now: Instant) -> TrackedObject {
        let id = self.next_id;
        self.next_id += 1;
        let keeping_count = 1;
        TrackedObject {
            id,
            born_at: now,
            age_ms: 0,
            position: raw.position,
            raw_position: raw.position,
            delta: Point2::ZERO,
            velocity: Point2::ZERO,
            screen_position: self.mapper.to_screen(raw.position),
            screen_delta: Point2::ZERO,
            pressed: keeping_count > self.config.press_delay,
            expired: false,
            is_noise,
            keeping_count,
            missing_count: 0,
            size: raw.size,
            heading: raw.heading,
            last_update: now,
        }
    }
}

type EventCtor = fn(TrackedObject) -> ObjectEvent;

/// Matched this frame: count, smooth, map, and decide press/update.
fn track_matched(
    object: &mut TrackedObject,
    raw: &RawObject,
    config: &TrackingConfig,
    mapper: &CoordinateMapper,
    now: Instant,
) -> Option<EventCtor> {
    let dt = now.saturating_duration_since(object.last_update).as_secs_f32();
    let previous = object.position;

    object.raw_position = raw.position;
    object.position = smooth_damp_point(
        object.position,
        raw.position,
        &mut object.velocity,
        config.smooth_time,
        dt,
    );
    object.delta = object.position - previous;
    let (screen, screen_delta) = mapper.map(object.position, Some(object.screen_position));
    object.screen_position = screen;
    object.screen_delta = screen_delta;
    object.size = raw.size;
    object.heading = raw.heading;
    object.last_update = now;
    object.age_ms = now.saturating_duration_since(object.born_at).as_millis() as u64;

    object.keeping_count = object.keeping_count.saturating_add(1);
    object.missing_count = 0;
    object.expired = false;

    let was_pressed = object.pressed;
    if !was_pressed && object.keeping_count > config.press_delay {
        object.pressed = true;
        return Some(ObjectEvent::Pressed);
    }
    let cadence = u64::from(config.update_delay) + 1;
    if was_pressed && (u64::from(object.keeping_count) + u64::from(config.press_delay)) % cadence == 0 {
        return Some(ObjectEvent::Updated);
    }
    None
}

/// Not matched this frame: count, release, expire.
fn track_missing(object: &mut TrackedObject, config: &TrackingConfig) -> Option<EventCtor> {
    object.missing_count = object.missing_count.saturating_add(1);
    object.delta = Point2::ZERO;
    object.screen_delta = Point2::ZERO;

    let mut event = None;
    if object.missing_count > config.release_delay {
        object.keeping_count = 0;
        if object.pressed {
            object.pressed = false;
            event = Some(ObjectEvent::Released as EventCtor);
        }
    }
    if u64::from(object.missing_count) > u64::from(config.release_delay) + u64::from(config.remove_delay) {
        object.expired = true;
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    const FRAME: Duration = Duration::from_millis(16);

    fn raw_at(x: f32, y: f32) -> RawObject {
        RawObject {
            steps: vec![0, 1, 2],
            distances: vec![1000, 1000, 1000],
            median_step: 1,
            median_distance: 1000,
            position: Point2::new(x, y),
            size: 50.0,
            heading: 90.0,
        }
    }

    fn config() -> TrackingConfig {
        TrackingConfig {
            tracking_distance: 200.0,
            smooth_time: 0.0,
            denoise_time_ms: 0,
            denoise_block_size: 100.0,
            press_delay: 2,
            update_delay: 1,
            release_delay: 1,
            remove_delay: 2,
        }
    }

    fn tracker(config: TrackingConfig, now: Instant) -> ObjectTracker {
        let mapper = CoordinateMapper::new(
            Rect::new(-1000.0, 0.0, 2000.0, 2000.0),
            Rect::new(0.0, 0.0, 1.0, 1.0),
        );
        ObjectTracker::new(config, mapper, now)
    }

    fn kinds(events: &[ObjectEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.kind()).collect()
    }

    #[test]
    fn test_full_lifecycle() {
        let cfg = config();
        let mut now = Instant::now();
        let mut t = tracker(cfg, now);
        let mut all = Vec::new();

        for _ in 0..=cfg.press_delay {
            now += FRAME;
            all.extend(t.update(vec![raw_at(0.0, 1000.0)], now));
        }
        for _ in 0..=(cfg.release_delay + cfg.remove_delay) {
            now += FRAME;
            all.extend(t.update(Vec::new(), now));
        }

        assert_eq!(kinds(&all), vec!["added", "pressed", "released", "removed"]);
        assert!(all.iter().all(|e| e.object().id == 1));
        assert!(t.objects().is_empty());
    }

    #[test]
    fn test_press_boundary() {
        let cfg = config();
        let mut now = Instant::now();
        let mut t = tracker(cfg, now);

        for frame in 1..=cfg.press_delay {
            now += FRAME;
            t.update(vec![raw_at(0.0, 1000.0)], now);
            assert_eq!(t.objects()[0].keeping_count, frame);
            assert!(!t.objects()[0].pressed, "pressed at keeping {}", frame);
        }
        now += FRAME;
        let events = t.update(vec![raw_at(0.0, 1000.0)], now);
        assert_eq!(kinds(&events), vec!["pressed"]);
        assert_eq!(t.objects()[0].keeping_count, cfg.press_delay + 1);
    }

    #[test]
    fn test_zero_press_delay_presses_on_creation() {
        let cfg = TrackingConfig {
            press_delay: 0,
            ..config()
        };
        let now = Instant::now();
        let mut t = tracker(cfg, now);
        let events = t.update(vec![raw_at(0.0, 1000.0)], now + FRAME);
        assert_eq!(kinds(&events), vec!["added", "pressed"]);
    }

    #[test]
    fn test_update_throttle() {
        let cfg = config();
        let mut now = Instant::now();
        let mut t = tracker(cfg, now);
        let mut updates = Vec::new();
        for _ in 0..10 {
            now += FRAME;
            for event in t.update(vec![raw_at(0.0, 1000.0)], now) {
                if let ObjectEvent::Updated(o) = event {
                    updates.push(o.keeping_count);
                }
            }
        }
        // Pressed at keeping 3; then every other frame where (keeping + 2) is even
        assert_eq!(updates, vec![4, 6, 8, 10]);
    }

    #[test]
    fn test_nearest_raw_wins() {
        let cfg = config();
        let mut now = Instant::now();
        let mut t = tracker(cfg, now);
        now += FRAME;
        t.update(vec![raw_at(0.0, 1000.0)], now);

        now += FRAME;
        let events = t.update(vec![raw_at(150.0, 1000.0), raw_at(50.0, 1000.0)], now);
        assert_eq!(kinds(&events), vec!["added"]);
        assert_eq!(events[0].object().id, 2);
        assert_eq!(events[0].object().position, Point2::new(150.0, 1000.0));
        assert_eq!(t.objects()[0].position, Point2::new(50.0, 1000.0));
    }

    #[test]
    fn test_beyond_tracking_distance_is_new_object() {
        let cfg = config();
        let mut now = Instant::now();
        let mut t = tracker(cfg, now);
        now += FRAME;
        t.update(vec![raw_at(0.0, 1000.0)], now);
        now += FRAME;
        let events = t.update(vec![raw_at(500.0, 1000.0)], now);
        assert_eq!(kinds(&events), vec!["added"]);
        assert_eq!(t.objects().len(), 2);
        assert_eq!(t.objects()[0].missing_count, 1);
    }

    #[test]
    fn test_noise_objects_never_emit() {
        let cfg = TrackingConfig {
            denoise_time_ms: 100,
            press_delay: 0,
            ..config()
        };
        let start = Instant::now();
        let mut t = tracker(cfg, start);
        let mut all = Vec::new();

        // Appears inside the window, then stays, then leaves
        let mut now = start + FRAME;
        for _ in 0..20 {
            all.extend(t.update(vec![raw_at(0.0, 1000.0)], now));
            now += FRAME;
        }
        assert!(t.objects()[0].is_noise);
        for _ in 0..10 {
            all.extend(t.update(Vec::new(), now));
            now += FRAME;
        }
        assert!(all.is_empty());
        // Expired noise stays as a mask
        assert_eq!(t.objects().len(), 1);
        assert!(t.objects()[0].expired);

        // A real object after the window is surfaced
        let events = t.update(vec![raw_at(800.0, 1000.0)], now);
        assert_eq!(kinds(&events), vec!["added", "pressed"]);
    }

    #[test]
    fn test_noise_masks_its_block_only() {
        let cfg = TrackingConfig {
            denoise_time_ms: 50,
            ..config()
        };
        let start = Instant::now();
        let mut t = tracker(cfg, start);
        t.update(vec![raw_at(0.0, 1000.0)], start + FRAME);

        let later = start + Duration::from_millis(200);
        // Within the block: absorbed by the noise object
        assert!(t.update(vec![raw_at(60.0, 1000.0)], later).is_empty());
        // Beyond the block but within tracking distance: a new object
        let events = t.update(vec![raw_at(0.0, 1000.0), raw_at(190.0, 1000.0)], later + FRAME);
        assert_eq!(kinds(&events), vec!["added"]);
    }

    #[test]
    fn test_start_denoise_drops_noise() {
        let cfg = TrackingConfig {
            denoise_time_ms: 50,
            ..config()
        };
        let start = Instant::now();
        let mut t = tracker(cfg, start);
        t.update(vec![raw_at(0.0, 1000.0)], start + FRAME);
        assert_eq!(t.objects().len(), 1);

        let later = start + Duration::from_millis(200);
        assert!(!t.is_denoising(later));
        t.start_denoise(later);
        assert!(t.is_denoising(later));
        assert!(t.objects().is_empty());
    }

    #[test]
    fn test_ids_are_never_reused() {
        let cfg = TrackingConfig {
            remove_delay: 0,
            release_delay: 0,
            ..config()
        };
        let mut now = Instant::now();
        let mut t = tracker(cfg, now);
        let mut ids = Vec::new();
        for _ in 0..3 {
            now += FRAME;
            for e in t.update(vec![raw_at(0.0, 1000.0)], now) {
                if let ObjectEvent::Added(o) = e {
                    ids.push(o.id);
                }
            }
            now += FRAME;
            t.update(Vec::new(), now);
        }
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_smoothing_lags_raw_position() {
        let cfg = TrackingConfig {
            smooth_time: 0.5,
            ..config()
        };
        let mut now = Instant::now();
        let mut t = tracker(cfg, now);
        now += FRAME;
        t.update(vec![raw_at(0.0, 1000.0)], now);
        now += FRAME;
        t.update(vec![raw_at(100.0, 1000.0)], now);

        let object = &t.objects()[0];
        assert_eq!(object.raw_position, Point2::new(100.0, 1000.0));
        assert!(object.position.x > 0.0 && object.position.x < 100.0);
        assert!(object.delta.x > 0.0);
        assert!(object.screen_delta.x > 0.0);
    }

    #[test]
    fn test_clear_reports_surfaced_objects() {
        let cfg = TrackingConfig {
            denoise_time_ms: 50,
            ..config()
        };
        let start = Instant::now();
        let mut t = tracker(cfg, start);
        t.update(vec![raw_at(0.0, 1000.0)], start + FRAME);
        t.update(
            vec![raw_at(0.0, 1000.0), raw_at(900.0, 1000.0)],
            start + Duration::from_millis(200),
        );
        let events = t.clear();
        assert_eq!(kinds(&events), vec!["removed"]);
        assert_eq!(events[0].object().id, 2);
        assert!(t.objects().is_empty());
    }

    #[test]
    fn test_extreme_delays_do_not_overflow() {
        let cfg = TrackingConfig {
            press_delay: 1,
            update_delay: u32::MAX,
            release_delay: u32::MAX,
            remove_delay: u32::MAX,
            ..config()
        };
        let mut now = Instant::now();
        let mut t = tracker(cfg, now);
        let mut all = Vec::new();

        for _ in 0..4 {
            now += FRAME;
            all.extend(t.update(vec![raw_at(0.0, 1000.0)], now));
        }
        for _ in 0..4 {
            now += FRAME;
            all.extend(t.update(Vec::new(), now));
        }

        assert_eq!(kinds(&all), vec!["added", "pressed"]);
        assert_eq!(t.objects().len(), 1);
        assert!(t.objects()[0].pressed);
        assert!(!t.objects()[0].expired);
    }
}
