//! Listener groups keyed by event name, and the handle that unregisters one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use msgchan_types::RemoteError;
use tracing::debug;

use super::endpoint::Shared;
use super::event::MsgEvent;

/// A listener callback.
///
/// Returning `Err` is how a listener "throws": on a fetch the error is sent
/// back to the peer as a rejection, otherwise it goes to the channel's
/// callback-error hook.
pub type Callback = Arc<dyn Fn(&MsgEvent) -> Result<(), RemoteError> + Send + Sync>;

struct ListenerEntry {
    id: u64,
    callback: Callback,
}

/// Event name -> ordered callbacks. Insertion order is invocation order.
#[derive(Default)]
pub(crate) struct ListenerTable {
    groups: DashMap<String, Vec<ListenerEntry>>,
    next_listener_id: AtomicU64,
}

impl ListenerTable {
    /// Append a callback to the group for `name`, creating the group if absent.
    pub(crate) fn insert(&self, name: &str, callback: Callback) -> u64 {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.groups
            .entry(name.to_string())
            .or_default()
            .push(ListenerEntry { id, callback });
        id
    }

    /// Remove exactly the registration `listener_id` from the group for `name`.
    ///
    /// The group itself is kept even when it becomes empty.
    pub(crate) fn remove(&self, name: &str, listener_id: u64) -> bool {
        let Some(mut group) = self.groups.get_mut(name) else {
            return false;
        };
        match group.iter().position(|entry| entry.id == listener_id) {
            Some(index) => {
                group.remove(index);
                true
            }
            None => false,
        }
    }

    /// Clone the callbacks registered under `name`.
    ///
    /// Returns `None` when nothing is registered. The shard lock is released
    /// before this returns, so callbacks may register or remove listeners.
    pub(crate) fn snapshot(&self, name: &str) -> Option<Vec<Callback>> {
        let group = self.groups.get(name)?;
        if group.is_empty() {
            return None;
        }
        Some(group.iter().map(|entry| Arc::clone(&entry.callback)).collect())
    }

    pub(crate) fn count(&self, name: &str) -> usize {
        self.groups.get(name).map(|group| group.len()).unwrap_or(0)
    }

    pub(crate) fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Handle returned by [`Channel::on`](super::Channel::on).
///
/// Dropping the handle keeps the listener registered; call
/// [`remove`](Self::remove) to unregister it.
#[derive(Debug)]
pub struct Subscription {
    shared: Weak<Shared>,
    name: String,
    listener_id: u64,
}

impl Subscription {
    pub(crate) fn new(shared: Weak<Shared>, name: String, listener_id: u64) -> Self {
        Self {
            shared,
            name,
            listener_id,
        }
    }

    /// The event name this listener is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unregister this listener.
    ///
    /// Returns `true` if it was still registered. Calling it again, or after
    /// the channel is gone, is a no-op.
    pub fn remove(&self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let removed = shared.listeners.remove(&self.name, self.listener_id);
        if removed {
            debug!(name = %self.name, listener_id = self.listener_id, "removed listener");
        }
        removed
    }
}
