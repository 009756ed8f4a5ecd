//! In-process duplex message port.
//!
//! `port_pair` returns two connected ports, each the far end of the other.
//! Attaching a [`Channel`] to a port routes its outbound envelopes to the peer
//! and spawns a pump task that feeds the peer's envelopes to the channel's
//! inbound handler, one at a time and in send order.

use msgchan_core::{Channel, Envelope};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::attachment::Attachment;
use crate::error::TransportError;

/// One end of an in-memory duplex port.
pub struct Port {
    tx: mpsc::Sender<Envelope>,
    rx: mpsc::Receiver<Envelope>,
}

/// Create two connected ports, each queue holding up to `buffer` envelopes.
///
/// A `buffer` of zero is raised to one slot.
pub fn port_pair(buffer: usize) -> (Port, Port) {
    let buffer = buffer.max(1);
    let (tx_a, rx_a) = mpsc::channel(buffer);
    let (tx_b, rx_b) = mpsc::channel(buffer);
    (Port { tx: tx_a, rx: rx_b }, Port { tx: tx_b, rx: rx_a })
}

impl Port {
    /// Wire `channel` to this port. Must be called inside a tokio runtime.
    ///
    /// When the peer's queue is full the outbound envelope is dropped with a
    /// warning; delivery guarantees are the caller's concern.
    pub fn attach(self, channel: &Channel) -> Attachment {
        let Port { tx, mut rx } = self;

        channel.register_outbound(move |envelope| match tx.try_send(envelope) {
            Ok(()) => {}
            Err(TrySendError::Full(envelope)) => {
                warn!(id = ?envelope.id, name = ?envelope.name, "port queue full, dropping envelope");
            }
            Err(TrySendError::Closed(envelope)) => {
                debug!(id = ?envelope.id, "peer port closed, dropping envelope");
            }
        });

        let handler = channel.inbound_handler();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let pump = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(envelope) => handler.handle(envelope),
                        None => break,
                    },
                }
            }
            debug!("memory port pump stopped");
            Ok::<(), TransportError>(())
        });

        Attachment::new(cancel, vec![pump])
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("peer_closed", &self.tx.is_closed())
            .field("capacity", &self.tx.capacity())
            .finish()
    }
}
