//! The `Channel` endpoint: registration, outbound traffic, and fetch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use msgchan_types::{ChannelConfig, ChannelError, Envelope, FetchOptions, RemoteError};
use serde::Serialize;
use tracing::{debug, error, warn};

use super::dispatch::Unhandled;
use super::event::MsgEvent;
use super::listener::{Callback, ListenerTable, Subscription};
use super::pending::{PendingFetch, PendingTable};

/// Outbound callback installed by the transport.
pub type Outbound = Arc<dyn Fn(Envelope) + Send + Sync>;

/// Hook for listener failures on notifications (no peer to notify).
pub type ErrorHook = Arc<dyn Fn(RemoteError) + Send + Sync>;

/// Hook for envelopes the channel drops without acting on them.
pub type UnhandledHook = Arc<dyn Fn(&Envelope, Unhandled) + Send + Sync>;

/// State owned by one channel endpoint.
pub(crate) struct Shared {
    pub(crate) next_id: AtomicU64,
    pub(crate) listeners: ListenerTable,
    pub(crate) pending: PendingTable,
    outbound: RwLock<Option<Outbound>>,
    pub(crate) callback_error: ErrorHook,
    pub(crate) unhandled: Option<UnhandledHook>,
    pub(crate) config: ChannelConfig,
}

/// One endpoint of a name-addressed messaging channel.
///
/// Multiplexes fire-and-forget notifications ([`send`](Self::send)) and
/// correlated requests ([`fetch`](Self::fetch)) over a single outbound
/// callback and a single inbound feed. Cloning yields another handle to the
/// same endpoint.
#[derive(Clone)]
pub struct Channel {
    pub(crate) shared: Arc<Shared>,
}

/// Builder for a [`Channel`] with non-default hooks or config.
#[derive(Default)]
pub struct ChannelBuilder {
    callback_error: Option<ErrorHook>,
    unhandled: Option<UnhandledHook>,
    config: ChannelConfig,
}

impl ChannelBuilder {
    /// Replace the hook that receives listener errors raised outside a fetch.
    pub fn callback_error(mut self, hook: impl Fn(RemoteError) + Send + Sync + 'static) -> Self {
        self.callback_error = Some(Arc::new(hook));
        self
    }

    /// Observe envelopes that are dropped (unmatched responses, unknown names).
    pub fn unhandled(mut self, hook: impl Fn(&Envelope, Unhandled) + Send + Sync + 'static) -> Self {
        self.unhandled = Some(Arc::new(hook));
        self
    }

    pub fn config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Channel {
        let callback_error = self
            .callback_error
            .unwrap_or_else(|| Arc::new(log_callback_error));

        Channel {
            shared: Arc::new(Shared {
                next_id: AtomicU64::new(0),
                listeners: ListenerTable::default(),
                pending: PendingTable::default(),
                outbound: RwLock::new(None),
                callback_error,
                unhandled: self.unhandled,
                config: self.config,
            }),
        }
    }
}

fn log_callback_error(err: RemoteError) {
    error!(kind = %err.kind, message = %err.message, "listener callback failed");
}

impl Channel {
    /// Create a channel with the default hooks and config.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ChannelBuilder {
        ChannelBuilder::default()
    }

    /// Install the function used for every outbound envelope.
    ///
    /// Replaces any previously installed callback.
    pub fn register_outbound(&self, callback: impl Fn(Envelope) + Send + Sync + 'static) {
        let mut outbound = self
            .shared
            .outbound
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *outbound = Some(Arc::new(callback));
    }

    /// Hand an envelope to the outbound callback as-is.
    ///
    /// Without a registered outbound callback the envelope is dropped with a
    /// warning.
    pub fn post(&self, envelope: Envelope) {
        let outbound = self
            .shared
            .outbound
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match outbound {
            Some(outbound) => outbound(envelope),
            None => warn!(
                id = ?envelope.id,
                name = ?envelope.name,
                "no outbound callback registered, dropping envelope; call register_outbound() first"
            ),
        }
    }

    /// Register `callback` for events named `name`.
    ///
    /// Callbacks under one name run in registration order. The returned
    /// [`Subscription`] removes exactly this registration.
    pub fn on<F>(&self, name: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&MsgEvent) -> Result<(), RemoteError> + Send + Sync + 'static,
    {
        let name = name.into();
        let callback: Callback = Arc::new(callback);
        let listener_id = self.shared.listeners.insert(&name, callback);
        debug!(%name, listener_id, "registered listener");
        Subscription::new(Arc::downgrade(&self.shared), name, listener_id)
    }

    /// Send a fire-and-forget notification.
    pub fn send<T: Serialize>(&self, name: impl Into<String>, data: T) -> Result<(), ChannelError> {
        let data = serde_json::to_value(data).map_err(|e| ChannelError::Serialize(e.to_string()))?;
        self.post(Envelope::notification(name, data));
        Ok(())
    }

    /// Send a request and return a future for its response.
    ///
    /// The request is posted before this returns. When no timeout is given the
    /// configured default (if any) applies.
    pub fn fetch<T: Serialize>(
        &self,
        name: impl Into<String>,
        data: T,
        options: Option<FetchOptions>,
    ) -> Result<PendingFetch, ChannelError> {
        let name = name.into();
        let data = serde_json::to_value(data).map_err(|e| ChannelError::Serialize(e.to_string()))?;

        let mut options = options.unwrap_or_default();
        if options.timeout.is_none() {
            options.timeout = self.shared.config.default_timeout_ms;
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let rx = self.shared.pending.insert(id);
        let timeout = options.timeout_duration();
        let pending = PendingFetch::new(id, rx, timeout, Arc::downgrade(&self.shared));

        debug!(id, %name, ?timeout, "sending fetch request");
        self.post(Envelope::request(id, name, data, options));
        Ok(pending)
    }

    /// The id the next `fetch` will use.
    pub fn next_id(&self) -> u64 {
        self.shared.next_id.load(Ordering::SeqCst)
    }

    /// Number of fetches still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    /// Number of listeners registered under `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.shared.listeners.count(name)
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let has_outbound = self
            .shared
            .outbound
            .read()
            .map(|outbound| outbound.is_some())
            .unwrap_or(false);

        f.debug_struct("Channel")
            .field("next_id", &self.next_id())
            .field("listener_groups", &self.shared.listeners.group_count())
            .field("pending", &self.pending_count())
            .field("outbound_registered", &has_outbound)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recording_channel(channel: Channel) -> (Channel, Arc<Mutex<Vec<Envelope>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sent);
        channel.register_outbound(move |env| sink.lock().unwrap().push(env));
        (channel, sent)
    }

    #[test]
    fn send_builds_notification() {
        let (channel, sent) = recording_channel(Channel::new());
        channel.send("test", json!({"foo": "bar"})).unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], Envelope::notification("test", json!({"foo": "bar"})));
    }

    #[test]
    fn send_without_outbound_does_not_panic() {
        let channel = Channel::new();
        channel.send("test", 1).unwrap();
        let pending = channel.fetch("test", 1, None).unwrap();
        assert_eq!(pending.id(), 0);
    }

    #[tokio::test]
    async fn fetch_posts_request_before_await() {
        let (channel, sent) = recording_channel(Channel::new());
        let pending = channel
            .fetch("x", 6, Some(FetchOptions::with_timeout(100)))
            .unwrap();

        {
            let sent = sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].id, Some(0));
            assert_eq!(sent[0].name.as_deref(), Some("x"));
            assert_eq!(sent[0].data, json!(6));
            assert_eq!(sent[0].options, Some(FetchOptions::with_timeout(100)));
        }
        assert_eq!(channel.pending_count(), 1);
        drop(pending);
    }

    #[tokio::test]
    async fn fetch_without_options_sends_empty_options() {
        let (channel, sent) = recording_channel(Channel::new());
        let _pending = channel.fetch("x", json!(null), None).unwrap();
        assert_eq!(sent.lock().unwrap()[0].options, Some(FetchOptions::default()));
    }

    #[tokio::test]
    async fn ids_increase_across_names() {
        let (channel, sent) = recording_channel(Channel::new());
        let a = channel.fetch("a", 1, None).unwrap();
        let b = channel.fetch("b", 2, None).unwrap();
        let c = channel.fetch("a", 3, None).unwrap();
        assert_eq!((a.id(), b.id(), c.id()), (0, 1, 2));
        assert_eq!(channel.next_id(), 3);

        drop((a, b, c));
        // Cancelled ids are not reused.
        let d = channel.fetch("a", 4, None).unwrap();
        assert_eq!(d.id(), 3);

        let ids: Vec<_> = sent.lock().unwrap().iter().map(|env| env.id).collect();
        assert_eq!(ids, vec![Some(0), Some(1), Some(2), Some(3)]);
    }

    #[tokio::test]
    async fn configured_default_timeout_applies() {
        let config = ChannelConfig {
            default_timeout_ms: Some(250),
            ..ChannelConfig::default()
        };
        let (channel, sent) = recording_channel(Channel::builder().config(config).build());
        let _a = channel.fetch("a", 1, None).unwrap();
        let _b = channel
            .fetch("a", 1, Some(FetchOptions::with_timeout(10)))
            .unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent[0].options, Some(FetchOptions::with_timeout(250)));
        assert_eq!(sent[1].options, Some(FetchOptions::with_timeout(10)));
    }

    #[test]
    fn serialize_failure_is_returned() {
        let (channel, sent) = recording_channel(Channel::new());
        let mut bad = std::collections::HashMap::new();
        bad.insert((1, 2), "tuple keys are not valid JSON object keys");

        let err = channel.send("x", &bad).unwrap_err();
        assert!(matches!(err, ChannelError::Serialize(_)));
        assert!(channel.fetch("x", &bad, None).is_err());
        assert!(sent.lock().unwrap().is_empty());
        assert_eq!(channel.next_id(), 0);
    }

    #[test]
    fn register_outbound_replaces_previous() {
        let (channel, first) = recording_channel(Channel::new());
        let (channel, second) = recording_channel(channel);
        channel.send("x", 1).unwrap();
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn debug_impl() {
        let channel = Channel::new();
        let _sub = channel.on("a", |_| Ok(()));
        let debug = format!("{channel:?}");
        assert!(debug.contains("Channel"));
        assert!(debug.contains("listener_groups: 1"));
        assert!(debug.contains("outbound_registered: false"));
    }
}
