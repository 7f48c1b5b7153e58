//! Broadcast-backed event channel.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::FieldError;

/// Maximum number of events buffered per channel.
const EVENT_BUFFER_SIZE: usize = 1024;

/// A named publish/subscribe bus carrying JSON payloads.
///
/// Thread-safe and shareable across the application. Every subscriber
/// receives every event published after its subscription started;
/// slow subscribers may observe lag and skip events.
pub struct EventChannel {
    name: String,
    sender: broadcast::Sender<serde_json::Value>,
}

impl EventChannel {
    /// Creates a channel with the default buffer size.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, EVENT_BUFFER_SIZE)
    }

    /// Creates a channel with an explicit buffer size.
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            name: name.into(),
            sender,
        }
    }

    /// Creates a channel wrapped in an `Arc` for sharing.
    pub fn shared(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// The channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event; 0
    /// when nobody is listening.
    pub fn publish(&self, event: serde_json::Value) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Serializes and publishes any `Serialize` payload.
    pub fn publish_message<T: serde::Serialize>(&self, message: T) -> Result<usize, FieldError> {
        let event = serde_json::to_value(message)
            .map_err(|e| FieldError::Handler(format!("channel '{}': {e}", self.name)))?;
        Ok(self.publish(event))
    }

    /// Subscribes to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<serde_json::Value> {
        self.sender.subscribe()
    }

    /// The number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscribers() {
        let channel = EventChannel::new("user-events");
        let mut receiver = channel.subscribe();

        let delivered = channel.publish(serde_json::json!({ "id": "u1" }));
        assert_eq!(delivered, 1);

        let event = receiver.recv().await.unwrap();
        assert_eq!(event["id"], "u1");
    }

    #[test]
    fn publish_without_subscribers_delivers_nothing() {
        let channel = EventChannel::new("user-events");
        assert_eq!(channel.publish(serde_json::json!({})), 0);
    }

    #[test]
    fn dropping_the_receiver_releases_the_subscription() {
        let channel = EventChannel::new("user-events");
        let receiver = channel.subscribe();
        assert_eq!(channel.subscriber_count(), 1);
        drop(receiver);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn publish_message_serializes_payloads() {
        #[derive(serde::Serialize)]
        struct UserCreated {
            id: u32,
        }

        let channel = EventChannel::new("user-events");
        let mut receiver = channel.subscribe();
        channel.publish_message(UserCreated { id: 7 }).unwrap();
        assert_eq!(receiver.recv().await.unwrap(), serde_json::json!({ "id": 7 }));
    }
}
