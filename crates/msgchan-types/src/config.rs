//! Channel configuration.
//!
//! `ChannelConfig` is usually loaded from a `config.toml`; every field has a
//! default so an empty file is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for a channel endpoint and the transports that carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Timeout (milliseconds) applied to fetches that do not set their own.
    ///
    /// `None` keeps the base protocol behavior of waiting forever.
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,

    /// Capacity of each direction of an in-memory port.
    #[serde(default = "default_port_buffer")]
    pub port_buffer: usize,
}

fn default_port_buffer() -> usize {
    256
}

impl ChannelConfig {
    pub fn default_timeout(&self) -> Option<Duration> {
        match self.default_timeout_ms {
            Some(ms) if ms > 0 => Some(Duration::from_millis(ms)),
            _ => None,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: None,
            port_buffer: default_port_buffer(),
        }
    }
}
