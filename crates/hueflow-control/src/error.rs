//! Error types for the device-facing side
use hueflow_core::CoreError;
use thiserror::Error;

/// Control errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// Invalid cluster / worker setup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport failure (timeout, refused connection, TLS, ...)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The device answered with a non-2xx status
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Worker or runtime failure outside a single request
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Error bubbled up from the domain model
    #[error(transparent)]
    Core(#[from] CoreError),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ControlError {
    /// Whether this error belongs to a single request rather than the worker
    pub fn is_request_failure(&self) -> bool {
        matches!(self, ControlError::Network(_) | ControlError::HttpStatus(_))
    }
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
