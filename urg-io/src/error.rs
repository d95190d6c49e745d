//! Error types for urg-io

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// urg-io error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the link (read returned end of stream)
    #[error("Connection closed by sensor")]
    Disconnected,

    /// Reply could not be parsed or carried a bad status
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Checksum mismatch on a reply line
    #[error("Checksum error: expected {expected:?}, got {actual:?}")]
    Checksum {
        /// Checksum computed over the line
        expected: char,
        /// Checksum character received
        actual: char,
    },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}
