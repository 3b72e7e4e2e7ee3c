use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::ReconnectPolicy;
use crate::codec::MessageCodec;
use crate::error::PipeError;
use crate::{DEFAULT_BUFFER_SIZE, DEFAULT_EXIT_SENTINEL};

/// Pipe client configuration, usually stored as `pipelink.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Read buffer size; each read is delivered as one message
    pub buffer_size: usize,
    /// Message that triggers the terminate handler
    pub exit_sentinel: String,
    /// Connect timeout in milliseconds (None = wait for the peer indefinitely)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
    /// Replace invalid UTF-8 with U+FFFD; when false, undecodable bytes are
    /// a read failure that halts the read loop
    pub lossy_utf8: bool,
    /// Backoff between reconnect attempts
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            exit_sentinel: DEFAULT_EXIT_SENTINEL.to_string(),
            connect_timeout_ms: None,
            lossy_utf8: true,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Check invariants the client relies on
    pub fn validate(&self) -> Result<(), PipeError> {
        if self.buffer_size == 0 {
            return Err(PipeError::Config("buffer_size must be greater than 0".to_string()));
        }
        if self.exit_sentinel.is_empty() {
            return Err(PipeError::Config("exit_sentinel must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn codec(&self) -> MessageCodec {
        if self.lossy_utf8 {
            MessageCodec::lossy()
        } else {
            MessageCodec::new()
        }
    }
}

/// Load and validate a client config from a TOML file
pub fn load_client_config(path: &Path) -> Result<ClientConfig, PipeError> {
    let content = std::fs::read_to_string(path)?;
    let config: ClientConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Save a client config as TOML, creating parent directories
pub fn save_client_config(path: &Path, config: &ClientConfig) -> Result<(), PipeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
