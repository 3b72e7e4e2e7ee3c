//! Pipe client error types

use thiserror::Error;

/// Errors that can occur while talking to the pipe peer
#[derive(Error, Debug)]
pub enum PipeError {
    /// Connect attempt failed (peer not listening, permission denied, bad name)
    #[error("Failed to connect to {endpoint}: {source}")]
    ConnectFailed {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Connect attempt did not complete in time
    #[error("Connect to {endpoint} timed out after {timeout_ms}ms")]
    ConnectTimeout { endpoint: String, timeout_ms: u64 },

    /// Endpoint name cannot be mapped to a local socket name
    #[error("Invalid endpoint name {0:?}")]
    InvalidEndpoint(String),

    /// Read completed with a fault other than end-of-stream
    #[error("Read failed: {0}")]
    ReadFailed(#[source] std::io::Error),

    /// Received bytes are not valid UTF-8
    #[error("Decode error: {0}")]
    Decode(#[from] std::str::Utf8Error),

    /// Write to the current transport failed
    #[error("Write failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// A newer start or stop took over while the connect was in flight
    #[error("Connect to {0} was cancelled by a newer start or stop")]
    Cancelled(String),

    /// Send attempted with no active transport
    #[error("Not connected")]
    NotConnected,

    /// Configuration is invalid
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// TOML parse error
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipeError {
    /// Stable error code for logs and machine-readable output
    pub fn error_code(&self) -> &'static str {
        match self {
            PipeError::ConnectFailed { .. } | PipeError::ConnectTimeout { .. } => {
                codes::CONNECT_FAILURE
            }
            PipeError::InvalidEndpoint(_) => codes::INVALID_ENDPOINT,
            PipeError::Cancelled(_) => codes::CANCELLED,
            PipeError::ReadFailed(_) | PipeError::Decode(_) => codes::READ_FAILURE,
            PipeError::WriteFailed(_) => codes::WRITE_FAILURE,
            PipeError::NotConnected => codes::NOT_CONNECTED,
            PipeError::Config(_) | PipeError::ConfigParse(_) | PipeError::ConfigSerialize(_) => {
                codes::CONFIG
            }
            PipeError::Io(_) => codes::IO_ERROR,
        }
    }
}

/// Result alias for pipe client operations
pub type Result<T> = std::result::Result<T, PipeError>;

/// Error codes reported alongside `Error` status events
pub mod codes {
    pub const CONNECT_FAILURE: &str = "connect_failure";
    pub const INVALID_ENDPOINT: &str = "invalid_endpoint";
    pub const CANCELLED: &str = "cancelled";
    pub const READ_FAILURE: &str = "read_failure";
    pub const WRITE_FAILURE: &str = "write_failure";
    pub const NOT_CONNECTED: &str = "not_connected";
    pub const CONFIG: &str = "config";
    pub const IO_ERROR: &str = "io_error";
}
