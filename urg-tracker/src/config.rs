//! Configuration loading for urg-tracker
//!
//! One TOML file describes every sensor. Each `[[sensors]]` entry carries its
//! own link, scan window, detection, tracking and screen settings; only the
//! transport is required.
//!
//! ```toml
//! [[sensors]]
//! name = "wall"
//!
//! [sensors.device.transport]
//! kind = "ethernet"
//! address = "192.168.0.10"
//!
//! [sensors.detection.crop]
//! method = "rect"
//! mount = "bottom"
//! area = { x = 0.0, y = 100.0, width = 3000.0, height = 1800.0 }
//! ```

use crate::detection::DetectionConfig;
use crate::error::{Result, TrackerError};
use crate::geometry::Rect;
use crate::scan_buffer::ScanGeometry;
use crate::tracking::TrackingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use urg_io::DeviceConfig;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    #[serde(default)]
    pub streaming: StreamingConfig,
}

/// Log filter used when `RUST_LOG` is unset
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// UDP event publishing
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StreamingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Destination of event datagrams
    #[serde(default = "default_stream_target")]
    pub target: String,
    /// Local address to send from
    #[serde(default = "default_stream_bind")]
    pub bind: String,
}

/// Screen rectangle that the detection area maps onto
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ScreenConfig {
    #[serde(default = "default_screen_area")]
    pub area: Rect,
}

/// One sensor and its processing chain
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SensorConfig {
    #[serde(default = "default_sensor_name")]
    pub name: String,
    /// Consumer tick period (ms); delays in `tracking` count these ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub geometry: ScanGeometry,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub screen: ScreenConfig,
}

impl SensorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Scan window with the device's grouping applied
    pub fn scan_geometry(&self) -> ScanGeometry {
        ScanGeometry {
            group_size: self.device.group_size.clamp(1, 99),
            ..self.geometry
        }
    }

    fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(TrackerError::Config(format!("sensor '{}': {}", self.name, msg)));

        if self.tick_interval_ms == 0 {
            return fail("tick_interval_ms must be positive".to_string());
        }
        if self.geometry.start_degree > self.geometry.end_degree {
            return fail(format!(
                "start_degree {} is past end_degree {}",
                self.geometry.start_degree, self.geometry.end_degree
            ));
        }
        if !(1..=99).contains(&self.device.group_size) {
            return fail(format!("group_size {} outside 1..=99", self.device.group_size));
        }
        if self.device.skip > 9 {
            return fail(format!("skip {} above 9", self.device.skip));
        }
        if self.tracking.tracking_distance <= 0.0 || self.tracking.smooth_time < 0.0 {
            return fail("tracking_distance must be positive and smooth_time non-negative".to_string());
        }
        if self.detection.detection_noise == 0 {
            return fail("detection_noise must be at least 1".to_string());
        }
        if self.screen.area.is_degenerate() {
            return fail(format!("screen area {:?} has no extent", self.screen.area));
        }
        Ok(())
    }
}

impl TrackerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TrackerError::Config(format!("Failed to read config file: {}", e)))?;
        Self::parse(&content)
    }

    /// Parse and validate TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: TrackerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sensors.is_empty() {
            return Err(TrackerError::Config("no [[sensors]] configured".to_string()));
        }
        for (i, sensor) in self.sensors.iter().enumerate() {
            if self.sensors[..i].iter().any(|s| s.name == sensor.name) {
                return Err(TrackerError::Config(format!(
                    "duplicate sensor name '{}'",
                    sensor.name
                )));
            }
            sensor.validate()?;
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target: default_stream_target(),
            bind: default_stream_bind(),
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            area: default_screen_area(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            name: default_sensor_name(),
            tick_interval_ms: default_tick_interval(),
            device: DeviceConfig::default(),
            geometry: ScanGeometry::default(),
            detection: DetectionConfig::default(),
            tracking: TrackingConfig::default(),
            screen: ScreenConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_stream_target() -> String {
    "127.0.0.1:7777".to_string()
}
fn default_stream_bind() -> String {
    "0.0.0.0:0".to_string()
}
fn default_screen_area() -> Rect {
    Rect::new(0.0, 0.0, 1920.0, 1080.0)
}
fn default_sensor_name() -> String {
    "urg".to_string()
}
fn default_tick_interval() -> u64 {
    16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{CropMethod, SensorMount};
    use urg_io::{MeasurementMode, TransportConfig};

    #[test]
    fn test_minimal_sensor() {
        let config = TrackerConfig::parse(
            r#"
[[sensors]]
[sensors.device.transport]
kind = "ethernet"
"#,
        )
        .unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(!config.streaming.enabled);
        let sensor = &config.sensors[0];
        assert_eq!(sensor.name, "urg");
        assert_eq!(sensor.tick_interval(), Duration::from_millis(16));
        assert_eq!(sensor.device.transport.endpoint(), "192.168.0.10:10940");
        assert_eq!(sensor.detection.crop, CropMethod::default());
        assert_eq!(sensor.tracking, TrackingConfig::default());
    }

    #[test]
    fn test_full_sensor() {
        let config = TrackerConfig::parse(
            r#"
[logging]
level = "debug"

[streaming]
enabled = true
target = "10.0.0.2:9000"

[[sensors]]
name = "floor"
tick_interval_ms = 33

[sensors.device]
mode = "polled"
group_size = 2

[sensors.device.transport]
kind = "serial"
port = "/dev/ttyACM0"

[sensors.geometry]
start_degree = -90.0
end_degree = 90.0
rotate_degree = 180.0
flip = true

[sensors.detection]
detection_delta = 80
detection_noise = 4
noise_rate = 1

[sensors.detection.crop]
method = "rect"
mount = "left"
area = { x = 50.0, y = 0.0, width = 2500.0, height = 1500.0 }

[sensors.tracking]
tracking_distance = 250.0
press_delay = 3

[sensors.screen]
area = { x = 0.0, y = 0.0, width = 1280.0, height = 720.0 }
"#,
        )
        .unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.streaming.target, "10.0.0.2:9000");
        let sensor = &config.sensors[0];
        assert_eq!(sensor.device.mode, MeasurementMode::Polled);
        assert_eq!(
            sensor.device.transport,
            TransportConfig::Serial {
                port: "/dev/ttyACM0".to_string(),
                baud_rate: 115200
            }
        );
        assert!(sensor.geometry.flip);
        assert_eq!(sensor.scan_geometry().group_size, 2);
        assert_eq!(sensor.detection.noise_rate, Some(1));
        assert_eq!(
            sensor.detection.crop,
            CropMethod::Rect {
                mount: SensorMount::Left,
                area: Rect::new(50.0, 0.0, 2500.0, 1500.0)
            }
        );
        assert_eq!(sensor.tracking.press_delay, 3);
        assert_eq!(sensor.tracking.release_delay, 1);
        assert_eq!(sensor.screen.area.width, 1280.0);
    }

    #[test]
    fn test_radius_crop() {
        let config = TrackerConfig::parse(
            r#"
[[sensors]]
[sensors.detection.crop]
method = "radius"
min = 100.0
max = 2000.0
"#,
        )
        .unwrap();
        assert_eq!(
            config.sensors[0].detection.crop,
            CropMethod::Radius {
                min: 100.0,
                max: 2000.0
            }
        );
    }

    #[test]
    fn test_shipped_example_parses() {
        let config = TrackerConfig::parse(include_str!("../../urg-tracker.toml")).unwrap();
        assert_eq!(config.sensors.len(), 1);
        assert_eq!(config.sensors[0].name, "wall");
        assert_eq!(config.sensors[0].detection.crop, CropMethod::default());
        assert_eq!(config.sensors[0].tracking, TrackingConfig::default());
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(TrackerConfig::parse("").is_err());
        assert!(
            TrackerConfig::parse(
                r#"
[[sensors]]
[sensors.geometry]
start_degree = 90.0
end_degree = -90.0
"#
            )
            .is_err()
        );
        assert!(
            TrackerConfig::parse(
                r#"
[[sensors]]
name = "a"
[[sensors]]
name = "a"
"#
            )
            .is_err()
        );
        assert!(TrackerConfig::parse("[[sensors]]\ntick_interval_ms = 0\n").is_err());
    }

    #[test]
    fn test_extreme_delays_are_accepted() {
        let config = TrackerConfig::parse(
            r#"
[[sensors]]
[sensors.tracking]
update_delay = 4294967295
release_delay = 4294967295
remove_delay = 4294967295
"#,
        )
        .unwrap();
        let tracking = config.sensors[0].tracking;
        assert_eq!(tracking.update_delay, u32::MAX);
        assert_eq!(tracking.release_delay, u32::MAX);
        assert_eq!(tracking.remove_delay, u32::MAX);
    }
}
