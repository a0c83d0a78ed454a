//! Custom error types for the backup engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Error: {status} {reason}: {message}")]
    Status {
        status: u16,
        reason: String,
        message: String,
    },

    #[error("Unexpected response shape: {0}")]
    Envelope(String),

    #[error("Authentication error: {0}")]
    Authentication(String),
}

impl From<::config::ConfigError> for BackupError {
    fn from(err: ::config::ConfigError) -> Self {
        BackupError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
