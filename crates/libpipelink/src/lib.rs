//! Self-healing client for a local named-pipe channel
//!
//! This crate provides:
//! - A pipe client that connects to a named endpoint and reconnects after the peer drops (PipeClient)
//! - Status and message handler registration (Handlers, PipeStatus)
//! - The transport seam and its local-socket implementation (Connector, LocalSocketConnector)
//! - UTF-8 message codec (MessageCodec)
//! - Client configuration and reconnect backoff (ClientConfig, ReconnectPolicy)

pub mod backoff;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use client::{ConnectionState, PipeClient};
pub use codec::MessageCodec;
pub use config::{load_client_config, save_client_config, ClientConfig};
pub use error::{PipeError, Result};
pub use events::{Handlers, PipeStatus, StatusEvent};
pub use transport::{Connector, LocalSocketConnector};

/// Default read buffer size in bytes; one read is one message
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Message that signals the peer wants the client to terminate
pub const DEFAULT_EXIT_SENTINEL: &str = "exit";

/// Default delays between reconnect attempts in milliseconds
pub const DEFAULT_RECONNECT_DELAYS_MS: [u64; 3] = [100, 1000, 3000];
