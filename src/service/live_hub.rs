use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// A change notification fanned out to WebSocket subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

pub fn tournament_topic(tournament_id: Uuid) -> String {
    format!("tournament:{}", tournament_id)
}

pub fn user_topic(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

/// The user id a `user:{id}` topic is scoped to, if it is one.
pub fn user_topic_owner(topic: &str) -> Option<Option<Uuid>> {
    topic
        .strip_prefix("user:")
        .map(|id| Uuid::parse_str(id).ok())
}

pub fn is_known_topic(topic: &str) -> bool {
    if let Some(owner) = user_topic_owner(topic) {
        return owner.is_some();
    }
    topic
        .strip_prefix("tournament:")
        .is_some_and(|id| Uuid::parse_str(id).is_ok())
}

/// In-process broadcast hub. Lagging receivers skip what they missed.
#[derive(Clone)]
pub struct LiveHub {
    sender: broadcast::Sender<LiveEvent>,
}

impl LiveHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, topic: String, payload: serde_json::Value) {
        // No receivers is not an error
        let delivered = self.sender.send(LiveEvent { topic, payload }).unwrap_or(0);
        debug!(receivers = delivered, "Live event published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.sender.subscribe()
    }
}

impl Default for LiveHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let hub = LiveHub::new();
        let mut rx = hub.subscribe();
        let topic = tournament_topic(Uuid::new_v4());

        hub.publish(topic.clone(), json!({"type": "bracket_generated"}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, topic);
        assert_eq!(event.payload["type"], "bracket_generated");
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let hub = LiveHub::new();
        hub.publish(user_topic(Uuid::new_v4()), json!({}));
    }

    #[tokio::test]
    async fn test_lagging_receiver_skips() {
        let hub = LiveHub::new();
        let mut rx = hub.subscribe();
        for i in 0..(CHANNEL_CAPACITY + 10) {
            hub.publish("tournament:x".to_string(), json!({ "i": i }));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert!(rx.recv().await.is_ok());
    }

    #[test]
    fn test_topic_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(user_topic_owner(&user_topic(id)), Some(Some(id)));
        assert_eq!(user_topic_owner("user:not-a-uuid"), Some(None));
        assert_eq!(user_topic_owner(&tournament_topic(id)), None);

        assert!(is_known_topic(&tournament_topic(id)));
        assert!(is_known_topic(&user_topic(id)));
        assert!(!is_known_topic("clan:123"));
        assert!(!is_known_topic("user:nope"));
    }
}
