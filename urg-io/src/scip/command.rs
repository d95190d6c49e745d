//! SCIP request encoding

use crate::config::ScanEncoding;
use std::fmt;

/// Step window and grouping of a measurement request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    pub start_step: u32,
    pub end_step: u32,
    /// Adjacent steps merged by the sensor (1 = none, max 99)
    pub group_size: u32,
}

impl ScanRange {
    pub fn new(start_step: u32, end_step: u32, group_size: u32) -> Self {
        Self {
            start_step,
            end_step,
            group_size: group_size.clamp(1, 99),
        }
    }

    /// Samples the sensor returns for this window
    pub fn sample_count(&self) -> usize {
        if self.end_step < self.start_step {
            return 0;
        }
        ((self.end_step - self.start_step) / self.group_size + 1) as usize
    }
}

/// Two-letter SCIP command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    Vv,
    Pp,
    Ii,
    Bm,
    Qt,
    Rs,
    Gd,
    Gs,
    Ge,
    Md,
    Ms,
    Me,
}

impl CommandCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandCode::Vv => "VV",
            CommandCode::Pp => "PP",
            CommandCode::Ii => "II",
            CommandCode::Bm => "BM",
            CommandCode::Qt => "QT",
            CommandCode::Rs => "RS",
            CommandCode::Gd => "GD",
            CommandCode::Gs => "GS",
            CommandCode::Ge => "GE",
            CommandCode::Md => "MD",
            CommandCode::Ms => "MS",
            CommandCode::Me => "ME",
        }
    }

    /// Classify a reply by its echoed command prefix
    pub fn from_echo(echo: &str) -> Option<Self> {
        let code = match echo.get(..2)? {
            "VV" => CommandCode::Vv,
            "PP" => CommandCode::Pp,
            "II" => CommandCode::Ii,
            "BM" => CommandCode::Bm,
            "QT" => CommandCode::Qt,
            "RS" => CommandCode::Rs,
            "GD" => CommandCode::Gd,
            "GS" => CommandCode::Gs,
            "GE" => CommandCode::Ge,
            "MD" => CommandCode::Md,
            "MS" => CommandCode::Ms,
            "ME" => CommandCode::Me,
            _ => return None,
        };
        Some(code)
    }

    /// `MD`/`MS`/`ME`: replies keep arriving until `QT`
    pub fn is_continuous(&self) -> bool {
        matches!(self, CommandCode::Md | CommandCode::Ms | CommandCode::Me)
    }

    /// Commands whose replies carry encoded samples
    pub fn is_measurement(&self) -> bool {
        matches!(
            self,
            CommandCode::Gd
                | CommandCode::Gs
                | CommandCode::Ge
                | CommandCode::Md
                | CommandCode::Ms
                | CommandCode::Me
        )
    }

    /// Characters per encoded sample
    pub fn block_size(&self) -> usize {
        match self {
            CommandCode::Gs | CommandCode::Ms => 2,
            _ => 3,
        }
    }

    /// Replies interleave distance and strength samples
    pub fn has_strength(&self) -> bool {
        matches!(self, CommandCode::Ge | CommandCode::Me)
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request sent to the sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScipCommand {
    /// Version information (`VV`)
    Version,
    /// Sensor parameters (`PP`)
    Parameters,
    /// Sensor status (`II`)
    Status,
    /// Laser on (`BM`)
    LaserOn,
    /// Laser off, stops continuous measurement (`QT`)
    LaserOff,
    /// Reset parameters to power-on state (`RS`)
    Reset,
    /// One scan
    Acquire {
        encoding: ScanEncoding,
        range: ScanRange,
    },
    /// Continuous scans; `scans == 0` streams until `QT`
    Measure {
        encoding: ScanEncoding,
        range: ScanRange,
        skip: u32,
        scans: u32,
    },
}

impl ScipCommand {
    pub fn code(&self) -> CommandCode {
        match self {
            ScipCommand::Version => CommandCode::Vv,
            ScipCommand::Parameters => CommandCode::Pp,
            ScipCommand::Status => CommandCode::Ii,
            ScipCommand::LaserOn => CommandCode::Bm,
            ScipCommand::LaserOff => CommandCode::Qt,
            ScipCommand::Reset => CommandCode::Rs,
            ScipCommand::Acquire { encoding, .. } => match encoding {
                ScanEncoding::Distance => CommandCode::Gd,
                ScanEncoding::ShortDistance => CommandCode::Gs,
                ScanEncoding::DistanceStrength => CommandCode::Ge,
            },
            ScipCommand::Measure { encoding, .. } => match encoding {
                ScanEncoding::Distance => CommandCode::Md,
                ScanEncoding::ShortDistance => CommandCode::Ms,
                ScanEncoding::DistanceStrength => CommandCode::Me,
            },
        }
    }

    /// Encode as a request line, LF terminated.
    pub fn encode(&self) -> String {
        let code = self.code();
        match self {
            ScipCommand::Acquire { range, .. } => format!(
                "{}{:04}{:04}{:02}\n",
                code,
                range.start_step.min(9999),
                range.end_step.min(9999),
                range.group_size
            ),
            ScipCommand::Measure {
                range, skip, scans, ..
            } => format!(
                "{}{:04}{:04}{:02}{:01}{:02}\n",
                code,
                range.start_step.min(9999),
                range.end_step.min(9999),
                range.group_size,
                skip.min(&9),
                scans.min(&99)
            ),
            _ => format!("{}\n", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_bare_commands() {
        assert_eq!(ScipCommand::Version.encode(), "VV\n");
        assert_eq!(ScipCommand::Parameters.encode(), "PP\n");
        assert_eq!(ScipCommand::Status.encode(), "II\n");
        assert_eq!(ScipCommand::LaserOn.encode(), "BM\n");
        assert_eq!(ScipCommand::LaserOff.encode(), "QT\n");
        assert_eq!(ScipCommand::Reset.encode(), "RS\n");
    }

    #[test]
    fn test_encode_measure() {
        let cmd = ScipCommand::Measure {
            encoding: ScanEncoding::Distance,
            range: ScanRange::new(0, 1080, 1),
            skip: 0,
            scans: 0,
        };
        assert_eq!(cmd.encode(), "MD0000108001000\n");

        let cmd = ScipCommand::Measure {
            encoding: ScanEncoding::DistanceStrength,
            range: ScanRange::new(44, 725, 3),
            skip: 2,
            scans: 15,
        };
        assert_eq!(cmd.encode(), "ME0044072503215\n");
    }

    #[test]
    fn test_encode_acquire() {
        let cmd = ScipCommand::Acquire {
            encoding: ScanEncoding::ShortDistance,
            range: ScanRange::new(44, 725, 1),
        };
        assert_eq!(cmd.encode(), "GS0044072501\n");
    }

    #[test]
    fn test_code_from_echo() {
        assert_eq!(CommandCode::from_echo("MD0000108001000"), Some(CommandCode::Md));
        assert_eq!(CommandCode::from_echo("VV"), Some(CommandCode::Vv));
        assert_eq!(CommandCode::from_echo("X"), None);
        assert_eq!(CommandCode::from_echo("ZZ"), None);
    }

    #[test]
    fn test_sample_count() {
        assert_eq!(ScanRange::new(0, 1080, 1).sample_count(), 1081);
        assert_eq!(ScanRange::new(0, 1080, 3).sample_count(), 361);
        assert_eq!(ScanRange::new(10, 5, 1).sample_count(), 0);
    }
}
