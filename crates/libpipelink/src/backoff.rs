//! Reconnect backoff policy
//!
//! Delays are applied before every reconnect attempt that follows a peer
//! disconnect. The initial connect made by `start` is never retried.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_RECONNECT_DELAYS_MS;

/// Delay table and attempt cap for reconnects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Delay before attempt N; the last entry repeats
    pub delays_ms: Vec<u64>,
    /// Give up after this many failed attempts (None = keep trying)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delays_ms: DEFAULT_RECONNECT_DELAYS_MS.to_vec(),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Policy with the given delays and no attempt cap
    pub fn with_delays(delays_ms: impl Into<Vec<u64>>) -> Self {
        Self {
            delays_ms: delays_ms.into(),
            max_attempts: None,
        }
    }

    /// Cap the number of reconnect attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay before the given zero-based attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let idx = (attempt as usize).min(self.delays_ms.len().saturating_sub(1));
        let ms = self.delays_ms.get(idx).copied().unwrap_or(0);
        Duration::from_millis(ms)
    }

    /// Whether another attempt is allowed after `attempts` failures
    pub fn allows(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts < max,
            None => true,
        }
    }
}
