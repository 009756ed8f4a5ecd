use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error kind used when a fetch times out locally.
pub const TIMEOUT_KIND: &str = "TimeOut";

/// Error kind used when a listener fails without naming a kind.
pub const DEFAULT_KIND: &str = "Error";

/// Error kind used when a listener panics.
pub const PANIC_KIND: &str = "Panic";

/// A `{kind, message}` error as it travels on the wire.
///
/// Listeners return this on failure; the channel turns it into a rejection
/// when the triggering event was a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    #[serde(alias = "name", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

fn default_kind() -> String {
    DEFAULT_KIND.to_string()
}

impl RemoteError {
    /// An error of the default kind.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: default_kind(),
            message: message.into(),
        }
    }

    pub fn with_kind(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for RemoteError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<RemoteError>() {
            Ok(remote) => remote,
            Err(err) => match err.downcast::<ChannelError>() {
                Ok(channel) => channel.into(),
                Err(err) => Self::new(format!("{err:#}")),
            },
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_kind("DataError", err.to_string())
    }
}

impl From<ChannelError> for RemoteError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Rejected(remote) => remote,
            other => Self::with_kind(other.kind(), other.to_string()),
        }
    }
}

/// Errors surfaced to callers of `send` and `fetch`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelError {
    /// The peer rejected the request, or one of its listeners failed.
    #[error("{0}")]
    Rejected(RemoteError),

    /// No response arrived before the fetch timeout elapsed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The channel was dropped while the request was outstanding.
    #[error("channel closed before the request settled")]
    Closed,

    /// The outbound payload could not be converted to a wire value.
    #[error("failed to serialize payload: {0}")]
    Serialize(String),

    /// A received payload did not match the requested type.
    #[error("failed to deserialize payload: {0}")]
    Deserialize(String),
}

impl ChannelError {
    /// The error kind as a peer would see it.
    pub fn kind(&self) -> &str {
        match self {
            Self::Rejected(remote) => &remote.kind,
            Self::Timeout(_) => TIMEOUT_KIND,
            Self::Closed => "Closed",
            Self::Serialize(_) => "SerializeError",
            Self::Deserialize(_) => "DeserializeError",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
