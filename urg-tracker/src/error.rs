//! Error types for urg-tracker

use thiserror::Error;

/// urg-tracker error type
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Device error: {0}")]
    Device(#[from] urg_io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for TrackerError {
    fn from(e: toml::de::Error) -> Self {
        TrackerError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
