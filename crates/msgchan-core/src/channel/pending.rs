//! Pending-request table and the future returned by `fetch`.
//!
//! Each in-flight fetch owns one `oneshot` pair. The sender lives in the
//! table; whoever removes it first (response, timeout, cancellation) is the
//! only party able to settle the fetch, so a second settlement cannot happen.

use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};
use std::time::Duration;

use dashmap::DashMap;
use msgchan_types::ChannelError;
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::{Instant, Sleep};
use tracing::debug;

use super::endpoint::Shared;

type Outcome = Result<serde_json::Value, ChannelError>;

/// Correlation id -> settle handle for every unsettled fetch.
#[derive(Default)]
pub(crate) struct PendingTable {
    entries: DashMap<u64, oneshot::Sender<Outcome>>,
}

impl PendingTable {
    pub(crate) fn insert(&self, id: u64) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.entries.insert(id, tx);
        rx
    }

    /// Atomically remove the entry for `id` and settle it.
    ///
    /// Returns `false` when no entry exists (already settled, timed out, or
    /// never issued by this channel).
    pub(crate) fn settle(&self, id: u64, outcome: Outcome) -> bool {
        match self.entries.remove(&id) {
            Some((_, tx)) => {
                if tx.send(outcome).is_err() {
                    debug!(id, "fetch future dropped before it settled");
                }
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `id` without settling it.
    pub(crate) fn discard(&self, id: u64) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Settle `id` as timed out if it is still pending.
fn expire(shared: &Weak<Shared>, id: u64, timeout: Duration) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    if shared.pending.settle(id, Err(ChannelError::Timeout(timeout))) {
        debug!(id, ?timeout, "fetch timed out");
    }
}

enum Timer {
    Off,
    /// Background task that expires the entry at the deadline.
    Armed(AbortHandle),
    /// Issued outside a runtime; the deadline is checked on poll.
    Lazy {
        deadline: Instant,
        sleep: Option<Pin<Box<Sleep>>>,
    },
}

impl Timer {
    fn arm(id: u64, timeout: Option<Duration>, shared: &Weak<Shared>) -> Self {
        let Some(timeout) = timeout else {
            return Self::Off;
        };
        match Handle::try_current() {
            Ok(handle) => {
                let shared = shared.clone();
                let task = handle.spawn(async move {
                    tokio::time::sleep(timeout).await;
                    expire(&shared, id, timeout);
                });
                Self::Armed(task.abort_handle())
            }
            Err(_) => Self::Lazy {
                deadline: Instant::now() + timeout,
                sleep: None,
            },
        }
    }

    fn disarm(&mut self) {
        if let Self::Armed(task) = std::mem::replace(self, Self::Off) {
            task.abort();
        }
    }
}

/// Future for one in-flight fetch.
///
/// The request has already been posted when this value exists; awaiting it
/// only waits for the outcome. The timeout runs from the moment the fetch is
/// issued whether or not the future is polled: once it fires the pending
/// entry is gone, and a late response is dropped as unmatched.
///
/// Dropping an unsettled `PendingFetch` cancels it: its pending entry is
/// removed and a later response for its id is discarded.
#[must_use = "dropping a PendingFetch cancels the request"]
pub struct PendingFetch {
    id: u64,
    rx: oneshot::Receiver<Outcome>,
    timeout: Option<Duration>,
    timer: Timer,
    shared: Weak<Shared>,
    settled: bool,
}

impl PendingFetch {
    /// Must be created after the pending entry for `id` is inserted.
    pub(crate) fn new(
        id: u64,
        rx: oneshot::Receiver<Outcome>,
        timeout: Option<Duration>,
        shared: Weak<Shared>,
    ) -> Self {
        let timer = Timer::arm(id, timeout, &shared);
        Self {
            id,
            rx,
            timeout,
            timer,
            shared,
            settled: false,
        }
    }

    /// The correlation id carried by the request.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancel the request without waiting for its outcome.
    pub fn cancel(self) {
        drop(self);
    }

    /// Await the outcome and deserialize it into `T`.
    pub async fn decode<T: DeserializeOwned>(self) -> Result<T, ChannelError> {
        let value = self.await?;
        serde_json::from_value(value).map_err(|e| ChannelError::Deserialize(e.to_string()))
    }
}

impl Future for PendingFetch {
    type Output = Result<serde_json::Value, ChannelError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;

        let lazy_expired = match &mut this.timer {
            Timer::Lazy { deadline, sleep } => {
                let deadline = *deadline;
                let sleep = sleep.get_or_insert_with(|| Box::pin(tokio::time::sleep_until(deadline)));
                sleep.as_mut().poll(cx).is_ready()
            }
            _ => false,
        };
        if lazy_expired {
            this.timer = Timer::Off;
            expire(&this.shared, this.id, this.timeout.unwrap_or_default());
        }

        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(result) => {
                this.settled = true;
                this.timer.disarm();
                Poll::Ready(result.unwrap_or(Err(ChannelError::Closed)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PendingFetch {
    fn drop(&mut self) {
        self.timer.disarm();
        if self.settled {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            if shared.pending.discard(self.id) {
                debug!(id = self.id, "fetch cancelled");
            }
        }
    }
}

impl std::fmt::Debug for PendingFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFetch")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .field("settled", &self.settled)
            .finish()
    }
}
