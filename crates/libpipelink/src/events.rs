//! Status and message events
//!
//! Handlers are invoked synchronously on the runtime worker that completed
//! the triggering connect or read. They must return quickly.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Status transitions reported to the status handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipeStatus {
    /// Transport connected, read loop armed
    Connected,
    /// Transport released (peer closed or explicit stop)
    Disconnected,
    /// Connect, read, decode or write failure
    Error,
    /// A message was received; payload is the running count
    MessageCount,
}

impl PipeStatus {
    /// Get the status as a string (for logs)
    pub fn as_str(&self) -> &'static str {
        match self {
            PipeStatus::Connected => "connected",
            PipeStatus::Disconnected => "disconnected",
            PipeStatus::Error => "error",
            PipeStatus::MessageCount => "message_count",
        }
    }
}

impl fmt::Display for PipeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status transition paired with its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: PipeStatus,
    /// Received-message count for `MessageCount`, zero otherwise
    pub count: u64,
}

impl StatusEvent {
    pub fn new(status: PipeStatus, count: u64) -> Self {
        Self { status, count }
    }
}

type StatusFn = Arc<dyn Fn(PipeStatus, u64) + Send + Sync>;
type MessageFn = Arc<dyn Fn(&str) + Send + Sync>;
type TerminateFn = Arc<dyn Fn() + Send + Sync>;

/// Handler registration for a pipe client
///
/// ```
/// use libpipelink::{Handlers, PipeStatus};
///
/// let handlers = Handlers::new()
///     .on_status(|status, count| println!("{status} {count}"))
///     .on_message(|text| println!("got {text}"))
///     .on_terminate(|| println!("peer asked us to exit"));
/// handlers.status(PipeStatus::Connected, 0);
/// ```
#[derive(Clone)]
pub struct Handlers {
    status: StatusFn,
    message: MessageFn,
    terminate: Option<TerminateFn>,
}

impl Handlers {
    /// Handlers that ignore every event
    pub fn new() -> Self {
        Self {
            status: Arc::new(|_, _| {}),
            message: Arc::new(|_| {}),
            terminate: None,
        }
    }

    /// Register the status handler
    pub fn on_status<F>(mut self, f: F) -> Self
    where
        F: Fn(PipeStatus, u64) + Send + Sync + 'static,
    {
        self.status = Arc::new(f);
        self
    }

    /// Register the handler for non-sentinel messages
    pub fn on_message<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.message = Arc::new(f);
        self
    }

    /// Register the handler invoked when the exit sentinel arrives
    pub fn on_terminate<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.terminate = Some(Arc::new(f));
        self
    }

    pub fn status(&self, status: PipeStatus, count: u64) {
        (self.status)(status, count)
    }

    pub fn message(&self, text: &str) {
        (self.message)(text)
    }

    pub fn terminate(&self) {
        if let Some(ref f) = self.terminate {
            f()
        }
    }
}

impl Default for Handlers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("terminate", &self.terminate.is_some())
            .finish_non_exhaustive()
    }
}
