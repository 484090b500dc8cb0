//! Error types for MargaNav

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, NavError>;

/// MargaNav error type
#[derive(Error, Debug)]
pub enum NavError {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame serialization / deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Protocol misuse (unknown controller, message without a session, ...)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for NavError {
    fn from(e: serde_json::Error) -> Self {
        NavError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}
