use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// Fan-out for countdown events: one hub for viewers, one for the admin console.
pub struct SseState {
    public: SseHub,
    admin: AdminChannel,
}

impl SseState {
    pub fn new(public_capacity: usize, admin_capacity: usize) -> Self {
        Self {
            public: SseHub::new(public_capacity),
            admin: AdminChannel::new(admin_capacity),
        }
    }

    pub fn public(&self) -> &SseHub {
        &self.public
    }

    pub fn admin(&self) -> &AdminChannel {
        &self.admin
    }
}

/// Admin hub plus the token bound to its single live subscriber.
///
/// The token exists only while an admin stream is open; write routes compare
/// the `X-Admin-Token` header against it.
pub struct AdminChannel {
    hub: SseHub,
    token: Mutex<Option<String>>,
}

impl AdminChannel {
    fn new(capacity: usize) -> Self {
        Self {
            hub: SseHub::new(capacity),
            token: Mutex::new(None),
        }
    }

    pub fn hub(&self) -> &SseHub {
        &self.hub
    }

    /// Issue a fresh token, or `None` when another admin stream already holds one.
    pub async fn claim(&self) -> Option<String> {
        let mut guard = self.token.lock().await;
        if guard.is_some() {
            return None;
        }
        let token = Uuid::new_v4().simple().to_string();
        *guard = Some(token.clone());
        Some(token)
    }

    /// Forget the token once its stream is gone.
    pub async fn release(&self) {
        self.token.lock().await.take();
    }

    /// Token of the live admin stream, if any.
    pub async fn token(&self) -> Option<String> {
        self.token.lock().await.clone()
    }
}

/// Broadcast channel of named SSE events.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Serialize `payload` as the data of an `event` message and fan it out.
    pub fn publish<T>(&self, event: &str, payload: &T) -> serde_json::Result<()>
    where
        T: Serialize,
    {
        let message = ServerEvent::json(Some(event.to_string()), payload)?;
        self.send(message);
        Ok(())
    }

    /// Fan out an already built event; having no subscribers is not an error.
    pub fn send(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::sse::SystemStatus;

    #[tokio::test]
    async fn admin_token_is_exclusive_until_released() {
        let channel = AdminChannel::new(4);
        let first = channel.claim().await.unwrap();
        assert_eq!(first.len(), 32);
        assert_eq!(channel.claim().await, None);
        assert_eq!(channel.token().await.as_deref(), Some(first.as_str()));

        channel.release().await;
        assert_eq!(channel.token().await, None);
        let second = channel.claim().await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn publish_names_the_event_and_serializes_the_payload() {
        let hub = SseHub::new(4);
        let mut rx = hub.subscribe();
        hub.publish("system.status", &SystemStatus { degraded: true })
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("system.status"));
        assert_eq!(event.data, r#"{"degraded":true}"#);
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let hub = SseHub::new(1);
        assert!(hub.publish("countdown.tick", &1).is_ok());
    }
}
