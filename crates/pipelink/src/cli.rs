use std::path::PathBuf;

use clap::Parser;
use libpipelink::{load_client_config, ClientConfig};

use crate::error::Result;

#[derive(Parser, Debug)]
#[command(
    name = "pipelink",
    about = "Stay attached to a local named pipe, reconnecting when the peer drops",
    version
)]
pub struct Cli {
    /// Endpoint name (bare pipe name, or a socket path)
    pub endpoint: String,

    /// TOML config file (see ClientConfig)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Read buffer size in bytes
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Message that ends the session
    #[arg(long)]
    pub exit_sentinel: Option<String>,

    /// Give up connecting after this many milliseconds
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// Maximum reconnect attempts after a disconnect
    #[arg(long)]
    pub max_reconnects: Option<u32>,

    /// Do not forward stdin lines to the peer
    #[arg(long)]
    pub no_stdin: bool,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Config file values overridden by command-line flags
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match self.config {
            Some(ref path) => load_client_config(path)?,
            None => ClientConfig::default(),
        };

        if let Some(buffer_size) = self.buffer_size {
            config.buffer_size = buffer_size;
        }
        if let Some(ref sentinel) = self.exit_sentinel {
            config.exit_sentinel = sentinel.clone();
        }
        if let Some(timeout_ms) = self.connect_timeout_ms {
            config.connect_timeout_ms = Some(timeout_ms);
        }
        if let Some(max) = self.max_reconnects {
            config.reconnect.max_attempts = Some(max);
        }

        config.validate()?;
        Ok(config)
    }
}
