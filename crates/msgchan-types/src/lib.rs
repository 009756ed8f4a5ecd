//! Shared wire and domain types for msgchan.
//!
//! This crate holds the envelope exchanged between two channel endpoints,
//! the fetch options carried on requests, channel configuration, and the
//! error types surfaced by the core.
//!
//! Zero runtime dependencies -- only serde, serde_json, thiserror, anyhow.

pub mod config;
pub mod envelope;
pub mod error;

pub use config::ChannelConfig;
pub use envelope::{Envelope, FetchOptions};
pub use error::{ChannelError, RemoteError};
