//! Inbound dispatch: settle pending fetches or fan events out to listeners.
//!
//! Listener failures are contained here. A listener that returns `Err` or
//! panics while handling a fetch produces a rejection for the peer; on a
//! notification the error goes to the channel's callback-error hook. Either
//! way the remaining listeners still run and nothing unwinds into the
//! transport.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use msgchan_types::error::PANIC_KIND;
use msgchan_types::{ChannelError, Envelope, FetchOptions, RemoteError};
use tracing::{debug, debug_span};

use super::endpoint::{Channel, Shared};
use super::event::MsgEvent;

/// Why an inbound envelope was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unhandled {
    /// A response or rejection arrived for an id with no pending fetch.
    UnmatchedResponse,
    /// No listener is registered under the event's name.
    NoListener,
    /// The envelope is neither a response nor a named event.
    MissingName,
}

/// Stable handler the transport feeds inbound envelopes into.
///
/// Holds a weak reference: once every [`Channel`] handle is dropped, further
/// envelopes are discarded.
#[derive(Clone)]
pub struct InboundHandler {
    shared: Weak<Shared>,
}

impl InboundHandler {
    /// Process one envelope. Call serially, in transport order.
    pub fn handle(&self, envelope: Envelope) {
        match self.shared.upgrade() {
            Some(shared) => Channel { shared }.handle_inbound(envelope),
            None => debug!(id = ?envelope.id, "channel dropped, discarding inbound envelope"),
        }
    }
}

impl std::fmt::Debug for InboundHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundHandler")
            .field("channel_alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl Channel {
    /// Return the handler to feed inbound envelopes into.
    pub fn inbound_handler(&self) -> InboundHandler {
        InboundHandler {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Process one inbound envelope.
    ///
    /// A panic raised by the callback-error hook itself propagates to the
    /// caller.
    pub fn handle_inbound(&self, envelope: Envelope) {
        if envelope.is_response() {
            self.settle(envelope);
        } else {
            self.dispatch(envelope);
        }
    }

    fn settle(&self, envelope: Envelope) {
        let Some(id) = envelope.id else {
            return;
        };

        let outcome = match &envelope.error {
            Some(error) => Err(ChannelError::Rejected(error.clone())),
            None => Ok(envelope.data.clone()),
        };
        let rejected = outcome.is_err();

        if self.shared.pending.settle(id, outcome) {
            debug!(id, rejected, "settled pending fetch");
        } else {
            debug!(id, "no pending fetch for response, dropping");
            self.report_unhandled(&envelope, Unhandled::UnmatchedResponse);
        }
    }

    fn dispatch(&self, envelope: Envelope) {
        let Some(name) = envelope.name.as_deref() else {
            debug!(id = ?envelope.id, "inbound event has no name, dropping");
            self.report_unhandled(&envelope, Unhandled::MissingName);
            return;
        };

        let Some(callbacks) = self.shared.listeners.snapshot(name) else {
            debug!(%name, "no listener registered, dropping");
            self.report_unhandled(&envelope, Unhandled::NoListener);
            return;
        };

        let Envelope {
            id,
            name,
            data,
            options,
            ..
        } = envelope;
        let name = name.unwrap_or_default();
        let _span = debug_span!("dispatch", name = %name, id = ?id).entered();

        let event = MsgEvent::new(
            self.clone(),
            id,
            name,
            data,
            options.unwrap_or_else(FetchOptions::default),
        );

        for callback in callbacks {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(&event)))
                .unwrap_or_else(|payload| Err(panic_error(payload)));

            let Err(err) = outcome else {
                continue;
            };

            if event.is_fetch() {
                debug!(kind = %err.kind, "listener failed during fetch, rejecting");
                event.reject(err);
            } else {
                (self.shared.callback_error)(err);
            }
        }
    }

    fn report_unhandled(&self, envelope: &Envelope, reason: Unhandled) {
        if let Some(hook) = &self.shared.unhandled {
            hook(envelope, reason);
        }
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> RemoteError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked".to_string()
    };
    RemoteError::with_kind(PANIC_KIND, message)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
