//! Infrastructure layer for msgchan.
//!
//! Transports that carry a [`msgchan_core::Channel`] over real plumbing, plus
//! the config file loader:
//! - `memory` -- in-process duplex port built on two bounded tokio queues
//! - `stream` -- newline-delimited JSON over any `AsyncRead`/`AsyncWrite` pair
//! - `attachment` -- handle for the pump tasks a transport spawns
//! - `config` -- `config.toml` loader with fallback to defaults

pub mod attachment;
pub mod config;
pub mod error;
pub mod memory;
pub mod stream;

pub use attachment::Attachment;
pub use error::TransportError;
