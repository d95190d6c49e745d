//! SCIP 2.0 protocol: request encoding, 6-bit sample decoding, reply
//! assembly and classification.

pub mod codec;
pub mod command;
pub mod info;
pub mod reply;

pub use codec::{decode_6bit, decode_scan_block, decode_scan_with_strength, encode_6bit};
pub use command::{CommandCode, ScanRange, ScipCommand};
pub use info::{ParameterInfo, StatusInfo, VersionInfo};
pub use reply::{Reply, ReplyAssembler, parse_reply};
