use std::io;
use thiserror::Error;

/// Custom error type for the sysdash application
#[derive(Error, Debug)]
pub enum DashError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Lookup failed: {0}")]
    Lookup(String),
}

/// Result type alias for sysdash
pub type Result<T> = std::result::Result<T, DashError>;

impl DashError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        DashError::Config(msg.into())
    }

    /// Create a lookup error
    pub fn lookup<S: Into<String>>(msg: S) -> Self {
        DashError::Lookup(msg.into())
    }
}
