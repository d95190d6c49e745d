//! Per-sensor processing chain
//!
//! ```text
//! UrgDevice ──scan──> ScanBuffer ──> ObjectDetector ──> ObjectTracker ──> listeners
//!     ^                   |                                  |
//!     └─ VV/PP/II, MD|BM ─┘ (direction table)                └─ CoordinateMapper
//! ```
//!
//! Everything runs on the caller's thread, one [`SensorPipeline::tick`] per
//! frame. The device's own threads only fill the scan snapshot and event queue.

use crate::config::SensorConfig;
use crate::detection::ObjectDetector;
use crate::mapper::CoordinateMapper;
use crate::scan_buffer::ScanBuffer;
use crate::tracking::{ObjectEvent, ObjectTracker};
use std::time::Instant;
use urg_io::{DeviceEvent, MeasurementMode, UrgDevice};

/// Receives the lifecycle events of one tick, in order
pub trait ObjectListener: Send {
    fn on_event(&mut self, sensor: &str, event: &ObjectEvent);
}

/// Logs lifecycle events; `Updated` only at trace level
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl ObjectListener for LoggingListener {
    fn on_event(&mut self, sensor: &str, event: &ObjectEvent) {
        let object = event.object();
        let level = match event {
            ObjectEvent::Updated(_) => log::Level::Trace,
            _ => log::Level::Info,
        };
        log::log!(
            level,
            "[{}] {} #{} at ({:.0}, {:.0}) screen ({:.0}, {:.0})",
            sensor,
            event.kind(),
            object.id,
            object.position.x,
            object.position.y,
            object.screen_position.x,
            object.screen_position.y
        );
    }
}

/// One sensor's device, scan buffer, detector and tracker
pub struct SensorPipeline {
    name: String,
    device: UrgDevice,
    buffer: ScanBuffer,
    detector: ObjectDetector,
    tracker: ObjectTracker,
    listeners: Vec<Box<dyn ObjectListener>>,
    /// `PP` has been applied since the last connect
    geometry_ready: bool,
}

impl SensorPipeline {
    pub fn new(config: &SensorConfig, now: Instant) -> Self {
        Self::with_device(config, UrgDevice::new(config.device.clone()), now)
    }

    /// Build around an existing device, e.g. one with a test connector
    pub fn with_device(config: &SensorConfig, device: UrgDevice, now: Instant) -> Self {
        let mapper = CoordinateMapper::new(config.detection.crop.detect_rect(), config.screen.area);
        Self {
            name: config.name.clone(),
            device,
            buffer: ScanBuffer::new(config.scan_geometry()),
            detector: ObjectDetector::new(config.detection),
            tracker: ObjectTracker::new(config.tracking, mapper, now),
            listeners: Vec::new(),
            geometry_ready: false,
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn ObjectListener>) {
        self.listeners.push(listener);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> &UrgDevice {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut UrgDevice {
        &mut self.device
    }

    pub fn buffer(&self) -> &ScanBuffer {
        &self.buffer
    }

    pub fn tracker(&self) -> &ObjectTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ObjectTracker {
        &mut self.tracker
    }

    /// Begin connecting; returns immediately
    pub fn start(&self) {
        log::info!("[{}] connecting to {}", self.name, self.device.endpoint());
        self.device.connect();
    }

    /// Stop measuring and drop the link
    pub fn stop(&mut self) {
        if self.device.is_connected() {
            self.device.stop_measurement();
        }
        self.device.disconnect();
        log::info!("[{}] stopped", self.name);
    }

    /// Run one frame: handle at most one device event, then process the
    /// newest scan if one arrived. Returns the events sent to listeners.
    pub fn tick(&mut self, now: Instant) -> Vec<ObjectEvent> {
        let mut events = Vec::new();

        if let Some(event) = self.device.tick() {
            self.handle_device_event(event, &mut events);
        }

        if self.device.config().mode == MeasurementMode::Polled
            && self.device.is_connected()
            && self.device.is_laser_on()
            && self.geometry_ready
        {
            let range = self.buffer.table().scan_range();
            self.device.acquire(range);
        }

        if let Some(frame) = self.device.take_scan() {
            self.buffer.refresh(frame);
            let raws = self
                .detector
                .detect(self.buffer.distances(), self.buffer.directions());
            events.extend(self.tracker.update(raws, now));
        }

        for event in &events {
            for listener in &mut self.listeners {
                listener.on_event(&self.name, event);
            }
        }
        events
    }

    fn handle_device_event(&mut self, event: DeviceEvent, events: &mut Vec<ObjectEvent>) {
        match event {
            DeviceEvent::Connected => {
                log::info!("[{}] connected", self.name);
                self.geometry_ready = false;
                self.device.request_version();
                self.device.request_parameters();
                self.device.request_status();
            }
            DeviceEvent::Disconnected => {
                log::warn!("[{}] disconnected", self.name);
                self.geometry_ready = false;
                self.buffer.clear();
                events.extend(self.tracker.clear());
            }
            DeviceEvent::Version(version) => {
                log::debug!("[{}] serial {}", self.name, version.serial);
            }
            DeviceEvent::Parameters(parameters) => {
                self.buffer.set_parameters(&parameters);
                self.detector.set_parameters(&parameters);
                self.geometry_ready = true;
                match self.device.config().mode {
                    MeasurementMode::Continuous => {
                        let range = self.buffer.table().scan_range();
                        self.device.start(range);
                    }
                    MeasurementMode::Polled => {
                        self.device.laser_on();
                    }
                }
            }
            DeviceEvent::Status(status) => {
                log::debug!("[{}] status: {} laser {}", self.name, status.status, status.laser);
            }
            DeviceEvent::ParametersReset => {
                log::debug!("[{}] sensor reset acknowledged", self.name);
            }
            DeviceEvent::MeasurementStarted => {
                log::debug!("[{}] measurement started", self.name);
            }
            DeviceEvent::LaserOn | DeviceEvent::LaserOff | DeviceEvent::ScanReceived { .. } => {}
        }
    }
}
