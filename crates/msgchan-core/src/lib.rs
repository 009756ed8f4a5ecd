//! Correlation and dispatch engine for msgchan.
//!
//! A [`Channel`] sits on top of any duplex transport. The transport feeds
//! inbound envelopes to [`Channel::inbound_handler`] and receives outbound
//! envelopes through the callback given to [`Channel::register_outbound`].
//! This crate never does IO itself -- see `msgchan-infra` for transports.

pub mod channel;

pub use channel::{
    Channel, ChannelBuilder, InboundHandler, MsgEvent, PendingFetch, Subscription, Unhandled,
};
pub use msgchan_types::{ChannelConfig, ChannelError, Envelope, FetchOptions, RemoteError};
