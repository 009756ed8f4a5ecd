//! Name-addressed messaging channel with notifications and correlated fetches.
//!
//! - `endpoint` -- `Channel`, its builder, outbound routing, `send` and `fetch`
//! - `dispatch` -- inbound handling: response settlement and listener fan-out
//! - `listener` -- listener groups and the `Subscription` unregister handle
//! - `pending` -- pending-request table and the `PendingFetch` future
//! - `event` -- `MsgEvent`, the view of an inbound event handed to listeners

pub mod dispatch;
pub mod endpoint;
pub mod event;
pub mod listener;
pub mod pending;

pub use dispatch::{InboundHandler, Unhandled};
pub use endpoint::{Channel, ChannelBuilder};
pub use event::MsgEvent;
pub use listener::Subscription;
pub use pending::PendingFetch;
