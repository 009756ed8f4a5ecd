//! The runtime view of an inbound notification or request handed to listeners.

use msgchan_types::{ChannelError, Envelope, FetchOptions, RemoteError};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::endpoint::Channel;

/// An inbound event, scoped to one dispatch.
pub struct MsgEvent {
    channel: Channel,
    id: Option<u64>,
    name: String,
    data: serde_json::Value,
    options: FetchOptions,
}

impl MsgEvent {
    pub(crate) fn new(
        channel: Channel,
        id: Option<u64>,
        name: String,
        data: serde_json::Value,
        options: FetchOptions,
    ) -> Self {
        Self {
            channel,
            id,
            name,
            data,
            options,
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    /// Deserialize the payload into `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, RemoteError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// The fetch options sent by the requester (empty for notifications).
    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// The channel that received this event.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// True when the peer issued a fetch and is waiting for an answer.
    pub fn is_fetch(&self) -> bool {
        self.id.is_some()
    }

    /// Answer the fetch with `data`.
    ///
    /// On a notification the envelope goes out without an id and the peer
    /// drops it.
    pub fn send<T: Serialize>(&self, data: T) -> Result<(), ChannelError> {
        let data = serde_json::to_value(data).map_err(|e| ChannelError::Serialize(e.to_string()))?;
        self.channel.post(Envelope::response(self.id, data));
        Ok(())
    }

    /// Reject the fetch; the peer's future fails with this kind and message.
    pub fn reject(&self, error: impl Into<RemoteError>) {
        self.channel.post(Envelope::rejection(self.id, error.into()));
    }
}

impl std::fmt::Debug for MsgEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsgEvent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("data", &self.data)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn recording_channel() -> (Channel, Arc<Mutex<Vec<Envelope>>>) {
        let channel = Channel::new();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sent);
        channel.register_outbound(move |env| sink.lock().unwrap().push(env));
        (channel, sent)
    }

    #[test]
    fn is_fetch_follows_id() {
        let channel = Channel::new();
        let request = MsgEvent::new(channel.clone(), Some(0), "a".into(), json!(1), FetchOptions::default());
        let notification = MsgEvent::new(channel, None, "a".into(), json!(1), FetchOptions::default());
        assert!(request.is_fetch());
        assert!(!notification.is_fetch());
    }

    #[test]
    fn send_posts_response_with_original_id() {
        let (channel, sent) = recording_channel();
        let event = MsgEvent::new(channel, Some(5), "x".into(), json!(6), FetchOptions::default());
        event.send(json!({"value": 12})).unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], Envelope::response(Some(5), json!({"value": 12})));
        assert!(sent[0].is_response());
    }

    #[test]
    fn reject_posts_error_and_null_data() {
        let (channel, sent) = recording_channel();
        let event = MsgEvent::new(channel, Some(2), "x".into(), json!(null), FetchOptions::default());
        event.reject(RemoteError::with_kind("TypeError", "Test Error"));

        let sent = sent.lock().unwrap();
        let error = sent[0].error.as_ref().unwrap();
        assert_eq!(sent[0].id, Some(2));
        assert_eq!(sent[0].data, serde_json::Value::Null);
        assert_eq!(error.kind, "TypeError");
        assert_eq!(error.message, "Test Error");
    }

    #[test]
    fn send_on_notification_has_no_id() {
        let (channel, sent) = recording_channel();
        let event = MsgEvent::new(channel, None, "x".into(), json!(1), FetchOptions::default());
        event.send(2).unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent[0].id, None);
        assert!(!sent[0].is_response());
    }

    #[test]
    fn data_as_reports_type_mismatch() {
        let channel = Channel::new();
        let event = MsgEvent::new(channel, None, "x".into(), json!("text"), FetchOptions::default());
        let err = event.data_as::<i64>().unwrap_err();
        assert_eq!(err.kind, "DataError");
        assert_eq!(event.data_as::<String>().unwrap(), "text");
    }
}
