//! The envelope exchanged between two channel endpoints.
//!
//! One shape covers every kind of traffic:
//! - **Notification:** `id` is null, `name` is set.
//! - **Request:** `id` and `name` are both set, `options` carries fetch options.
//! - **Response:** `id` is set, `name` is null, `data` holds the answer.
//! - **Rejection:** like a response, with `error` set and `data` null.

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// Options attached to an outbound fetch request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Milliseconds before an unanswered request is rejected locally.
    ///
    /// `None` and `Some(0)` both mean "wait forever".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl FetchOptions {
    /// Options with the given timeout in milliseconds.
    pub fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            timeout: Some(timeout_ms),
        }
    }

    /// The timeout as a duration, if one is armed.
    pub fn timeout_duration(&self) -> Option<std::time::Duration> {
        match self.timeout {
            Some(ms) if ms > 0 => Some(std::time::Duration::from_millis(ms)),
            _ => None,
        }
    }
}

/// The unit handed to and received from the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation id. Null on notifications.
    #[serde(default)]
    pub id: Option<u64>,
    /// Event/route name. Null on responses and rejections.
    #[serde(default)]
    pub name: Option<String>,
    /// Opaque payload.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Present only on a rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
    /// Present only on an outbound fetch request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<FetchOptions>,
}

impl Envelope {
    /// Build a fire-and-forget notification.
    pub fn notification(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            data,
            error: None,
            options: None,
        }
    }

    /// Build a request expecting exactly one response or rejection.
    pub fn request(
        id: u64,
        name: impl Into<String>,
        data: serde_json::Value,
        options: FetchOptions,
    ) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
            data,
            error: None,
            options: Some(options),
        }
    }

    /// Build a response answering request `id`.
    pub fn response(id: Option<u64>, data: serde_json::Value) -> Self {
        Self {
            id,
            name: None,
            data,
            error: None,
            options: None,
        }
    }

    /// Build a rejection for request `id`.
    pub fn rejection(id: Option<u64>, error: RemoteError) -> Self {
        Self {
            id,
            name: None,
            data: serde_json::Value::Null,
            error: Some(error),
            options: None,
        }
    }

    /// True iff this envelope settles a pending request.
    ///
    /// Anything else is an inbound event and must carry a name.
    pub fn is_response(&self) -> bool {
        self.id.is_some() && self.name.is_none()
    }
}
