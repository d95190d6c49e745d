//! Device configuration
//!
//! Describes how to reach one sensor and how to ask it for scans. Loaded as
//! part of the daemon's TOML file; every field except the transport has a
//! default so a minimal sensor entry is just an address.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Factory address of Ethernet URG models
pub const DEFAULT_ETHERNET_ADDRESS: &str = "192.168.0.10";
/// Factory TCP port of Ethernet URG models
pub const DEFAULT_ETHERNET_PORT: u16 = 10940;
/// Baud rate used by USB/serial URG models
pub const DEFAULT_SERIAL_BAUD: u32 = 115200;

/// Physical link to the sensor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    /// TCP link (UST/UTM Ethernet models)
    Ethernet {
        #[serde(default = "default_address")]
        address: String,
        #[serde(default = "default_port")]
        port: u16,
    },
    /// Serial link (URG-04LX and other USB models)
    Serial {
        port: String,
        #[serde(default = "default_baud")]
        baud_rate: u32,
    },
}

impl TransportConfig {
    /// Human readable endpoint for log lines
    pub fn endpoint(&self) -> String {
        match self {
            TransportConfig::Ethernet { address, port } => format!("{}:{}", address, port),
            TransportConfig::Serial { port, baud_rate } => format!("{}@{}", port, baud_rate),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Ethernet {
            address: default_address(),
            port: default_port(),
        }
    }
}

/// How scans are requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementMode {
    /// `MD`/`ME`/`MS`: the sensor streams scans until told to stop
    #[default]
    Continuous,
    /// `GD`/`GE`/`GS`: one scan per request, issued once per tick
    Polled,
}

/// Sample encoding requested from the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanEncoding {
    /// 3-character distances (`MD`/`GD`)
    #[default]
    Distance,
    /// 2-character distances, max 4095mm (`MS`/`GS`)
    ShortDistance,
    /// 3-character distance + strength pairs (`ME`/`GE`)
    DistanceStrength,
}

/// Per-sensor device settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub transport: TransportConfig,
    pub mode: MeasurementMode,
    pub encoding: ScanEncoding,
    /// Adjacent steps merged into one sample by the sensor (1 = none)
    pub group_size: u32,
    /// Scans skipped between transmitted scans in continuous mode
    pub skip: u32,
    /// Delay before a failed or lost connection is retried (0 = never)
    pub reconnect_interval_ms: u64,
    pub connect_timeout_ms: u64,
    /// Blocking read slice of the reader thread
    pub read_timeout_ms: u64,
    /// Drop replies whose line checksums do not match
    pub verify_checksum: bool,
}

impl DeviceConfig {
    pub fn reconnect_interval(&self) -> Option<Duration> {
        (self.reconnect_interval_ms > 0).then(|| Duration::from_millis(self.reconnect_interval_ms))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            mode: MeasurementMode::default(),
            encoding: ScanEncoding::default(),
            group_size: 1,
            skip: 0,
            reconnect_interval_ms: 3000,
            connect_timeout_ms: 3000,
            read_timeout_ms: 100,
            verify_checksum: false,
        }
    }
}

fn default_address() -> String {
    DEFAULT_ETHERNET_ADDRESS.to_string()
}
fn default_port() -> u16 {
    DEFAULT_ETHERNET_PORT
}
fn default_baud() -> u32 {
    DEFAULT_SERIAL_BAUD
}
