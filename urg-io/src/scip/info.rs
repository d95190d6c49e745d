//! `VV` / `PP` / `II` information blocks
//!
//! Each field arrives on its own line as `KEY:value;` followed by a checksum
//! character. Fields are looked up by their 5-character `KEY:` prefix.

use serde::{Deserialize, Serialize};

/// Find `key` (e.g. `"ARES"`) and return the text up to the next `;`.
pub fn find_field<'a>(lines: &'a [String], key: &str) -> Option<&'a str> {
    let prefix_len = key.len() + 1;
    lines.iter().find_map(|line| {
        let head = line.get(..prefix_len)?;
        if !head.starts_with(key) || !head.ends_with(':') {
            return None;
        }
        let rest = &line[prefix_len..];
        Some(rest.split(';').next().unwrap_or(rest))
    })
}

fn text_field(lines: &[String], key: &str) -> String {
    find_field(lines, key).unwrap_or_default().to_string()
}

fn int_field(lines: &[String], key: &str) -> i64 {
    find_field(lines, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Reply to `VV`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub vendor: String,
    pub product: String,
    pub firmware: String,
    pub protocol: String,
    pub serial: String,
}

impl VersionInfo {
    pub fn parse(lines: &[String]) -> Self {
        Self {
            vendor: text_field(lines, "VEND"),
            product: text_field(lines, "PROD"),
            firmware: text_field(lines, "FIRM"),
            protocol: text_field(lines, "PROT"),
            serial: text_field(lines, "SERI"),
        }
    }
}

/// Reply to `PP`: the sensor's scan geometry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub model: String,
    /// Minimum valid distance (mm); smaller values are error codes
    pub min_distance: u32,
    pub max_distance: u32,
    /// Steps per full revolution ("area total")
    pub area_total: u32,
    pub min_step: u32,
    pub max_step: u32,
    /// Step pointing straight ahead
    pub front_step: u32,
    /// Motor speed (rpm)
    pub scan_rpm: u32,
}

impl ParameterInfo {
    pub fn parse(lines: &[String]) -> Self {
        let field = |key: &str| int_field(lines, key).max(0) as u32;
        Self {
            model: text_field(lines, "MODL"),
            min_distance: field("DMIN"),
            max_distance: field("DMAX"),
            area_total: field("ARES"),
            min_step: field("AMIN"),
            max_step: field("AMAX"),
            front_step: field("AFRT"),
            scan_rpm: field("SCAN"),
        }
    }

    /// The parameters carry usable geometry
    pub fn is_valid(&self) -> bool {
        self.area_total > 0 && self.max_step > self.min_step
    }
}

impl Default for ParameterInfo {
    /// UST-10LX values, used until the sensor reports its own
    fn default() -> Self {
        Self {
            model: String::new(),
            min_distance: 20,
            max_distance: 30000,
            area_total: 1440,
            min_step: 0,
            max_step: 1080,
            front_step: 540,
            scan_rpm: 2400,
        }
    }
}

/// Reply to `II`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub model: String,
    pub laser: String,
    pub scan_speed: String,
    pub measurement_mode: String,
    pub bit_rate: String,
    /// Sensor clock (ms) at the time of the reply
    pub time: u32,
    pub status: String,
}

impl StatusInfo {
    pub fn parse(lines: &[String]) -> Self {
        let time = find_field(lines, "TIME")
            .and_then(|t| {
                if t.len() == 4 {
                    super::codec::decode_6bit(t.as_bytes(), 4, 0)
                } else {
                    u32::from_str_radix(t.trim(), 16).ok()
                }
            })
            .unwrap_or(0);
        Self {
            model: text_field(lines, "MODL"),
            laser: text_field(lines, "LASR"),
            scan_speed: text_field(lines, "SCSP"),
            measurement_mode: text_field(lines, "MESM"),
            bit_rate: text_field(lines, "SBPS"),
            time,
            status: text_field(lines, "STAT"),
        }
    }

    pub fn is_laser_on(&self) -> bool {
        self.laser.starts_with("ON")
    }

    /// Motor speed in rpm, 0 if unreadable
    pub fn scan_rpm(&self) -> u32 {
        let digits: String = self
            .scan_speed
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().unwrap_or(0)
    }
}
