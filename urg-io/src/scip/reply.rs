//! Reply assembly and classification
//!
//! A reply is the echoed command line, a status line, an optional payload
//! and a blank terminator line:
//!
//! ```text
//! MD0044072501000      echo
//! 99b                  status + checksum
//! 0Dh5c                timestamp (4 chars) + checksum
//! 0m20m30m4...?        up to 64 data chars + checksum, repeated
//!                      blank line ends the reply
//! ```

use super::codec::{
    decode_6bit, decode_scan_block, decode_scan_with_strength, verify_checksum,
    verify_field_checksum,
};
use super::command::{CommandCode, ScanRange};
use super::info::{ParameterInfo, StatusInfo, VersionInfo};
use crate::error::{Error, Result};
use crate::scan::ScanFrame;

/// Status of a successful one-shot reply (and of a continuous-start ack)
pub const STATUS_OK: &str = "00";
/// Status of a data reply in a continuous stream
pub const STATUS_STREAMING: &str = "99";
/// `BM` status when the laser was already on
pub const STATUS_LASER_ALREADY_ON: &str = "02";

/// Partial input above this size without a terminator is discarded
const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Splits a byte stream into complete replies.
///
/// Accepts LF or CR/LF line endings. Blank lines outside a reply are ignored.
#[derive(Debug, Default)]
pub struct ReplyAssembler {
    partial: Vec<u8>,
    lines: Vec<String>,
    pending_bytes: usize,
}

impl ReplyAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every reply completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<String>> {
        let mut replies = Vec::new();
        for &b in bytes {
            match b {
                b'\r' => {}
                b'\n' => {
                    if self.partial.is_empty() {
                        if !self.lines.is_empty() {
                            replies.push(std::mem::take(&mut self.lines));
                            self.pending_bytes = 0;
                        }
                    } else {
                        let line = String::from_utf8_lossy(&self.partial).into_owned();
                        self.partial.clear();
                        self.lines.push(line);
                    }
                }
                _ => {
                    self.partial.push(b);
                    self.pending_bytes += 1;
                    if self.pending_bytes > MAX_PENDING_BYTES {
                        log::warn!(
                            "Discarding {} bytes of unterminated SCIP input",
                            self.pending_bytes
                        );
                        self.clear();
                    }
                }
            }
        }
        replies
    }

    pub fn clear(&mut self) {
        self.partial.clear();
        self.lines.clear();
        self.pending_bytes = 0;
    }
}

/// A classified reply
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Version(VersionInfo),
    Parameters(ParameterInfo),
    Status(StatusInfo),
    LaserOn,
    LaserOff,
    Reset,
    /// First reply to `MD`/`ME`/`MS`: the stream has started
    MeasurementStarted(CommandCode),
    Scan(ScanFrame),
}

/// Status code of a reply (first two characters of its second line)
pub fn status_code(lines: &[String]) -> Option<&str> {
    lines.get(1)?.get(..2)
}

/// Parse the step window echoed back by a measurement reply
fn echoed_range(echo: &str) -> Option<ScanRange> {
    let start = echo.get(2..6)?.parse().ok()?;
    let end = echo.get(6..10)?.parse().ok()?;
    let group = echo.get(10..12)?.parse().ok()?;
    Some(ScanRange::new(start, end, group))
}

/// Classify one reply.
///
/// Any error means the reply must be dropped whole.
pub fn parse_reply(lines: &[String], verify: bool) -> Result<Reply> {
    let echo = lines
        .first()
        .ok_or_else(|| Error::Protocol("empty reply".to_string()))?;
    let code = CommandCode::from_echo(echo)
        .ok_or_else(|| Error::Protocol(format!("unknown command echo {:?}", echo)))?;
    let status = status_code(lines)
        .ok_or_else(|| Error::Protocol(format!("{} reply without status", code)))?;

    if verify {
        verify_checksum(&lines[1])?;
        let info = matches!(code, CommandCode::Vv | CommandCode::Pp | CommandCode::Ii);
        for line in &lines[2..] {
            if info {
                verify_field_checksum(line)?;
            } else {
                verify_checksum(line)?;
            }
        }
    }

    let bad_status = || Error::Protocol(format!("{} status {:?}", code, status));

    if code.is_measurement() {
        return if code.is_continuous() && status == STATUS_OK {
            Ok(Reply::MeasurementStarted(code))
        } else if (code.is_continuous() && status == STATUS_STREAMING)
            || (!code.is_continuous() && status == STATUS_OK)
        {
            parse_scan(code, echo, lines).map(Reply::Scan)
        } else {
            Err(bad_status())
        };
    }

    match (code, status) {
        (CommandCode::Bm, STATUS_OK | STATUS_LASER_ALREADY_ON) => Ok(Reply::LaserOn),
        (_, STATUS_OK) => Ok(match code {
            CommandCode::Vv => Reply::Version(VersionInfo::parse(lines)),
            CommandCode::Pp => Reply::Parameters(ParameterInfo::parse(lines)),
            CommandCode::Ii => Reply::Status(StatusInfo::parse(lines)),
            CommandCode::Qt => Reply::LaserOff,
            CommandCode::Rs => Reply::Reset,
            _ => Reply::LaserOn,
        }),
        _ => Err(bad_status()),
    }
}

fn parse_scan(code: CommandCode, echo: &str, lines: &[String]) -> Result<ScanFrame> {
    let timestamp = lines
        .get(2)
        .and_then(|line| decode_6bit(line.as_bytes(), 4, 0))
        .ok_or_else(|| Error::Protocol(format!("{} reply without timestamp", code)))?;

    let block_size = code.block_size();
    let (distances, strengths) = if code.has_strength() {
        decode_scan_with_strength(lines, 3, block_size)
    } else {
        (decode_scan_block(lines, 3, block_size), Vec::new())
    };

    let range = echoed_range(echo);
    if let Some(range) = range
        && range.sample_count() != distances.len()
    {
        return Err(Error::Protocol(format!(
            "{} expected {} samples, decoded {}",
            code,
            range.sample_count(),
            distances.len()
        )));
    }

    Ok(ScanFrame {
        command: code,
        timestamp,
        distances,
        strengths,
        range,
    })
}
