//! Progress events and the per-channel broadcast bus
//!
//! Progress notifications are transient: they are fanned out to whoever is
//! subscribed to the channel at publish time and lost otherwise. Nothing
//! here is persisted.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Percentage sentinel carried by error progress events
pub const ERROR_PERCENTAGE: i32 = -1;

/// Transient progress notification for one enrichment request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// 0-100 in the happy path; negative for error signaling
    pub percentage: i32,
    /// Human-readable description of the current step
    pub message: String,
    /// Dish the event refers to
    pub dish_name: String,
    /// When the event was emitted
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    /// Build a checkpoint event at the given percentage
    pub fn at(percentage: i32, message: impl Into<String>, dish_name: impl Into<String>) -> Self {
        Self {
            percentage,
            message: message.into(),
            dish_name: dish_name.into(),
            timestamp: Utc::now(),
        }
    }

    /// Build an error event carrying the failure message
    pub fn error(message: impl Into<String>, dish_name: impl Into<String>) -> Self {
        Self::at(ERROR_PERCENTAGE, message, dish_name)
    }

    /// True for events signaling a failure
    pub fn is_error(&self) -> bool {
        self.percentage < 0
    }
}

/// Per-channel progress fan-out over tokio broadcast
///
/// Each `channel_id` gets its own broadcast sender, created lazily on first
/// subscribe. Publishing to a channel nobody listens on is a silent no-op;
/// senders whose last receiver has gone away are pruned on the next publish.
#[derive(Clone)]
pub struct ProgressBus {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<ProgressEvent>>>>,
    capacity: usize,
}

impl ProgressBus {
    /// Create a bus whose channels buffer `capacity` events each
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Subscribe to all future events on `channel_id`
    pub async fn subscribe(&self, channel_id: Uuid) -> broadcast::Receiver<ProgressEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(channel_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish an event to `channel_id`, ignoring delivery failures
    pub async fn publish(&self, channel_id: Uuid, event: ProgressEvent) {
        let mut channels = self.channels.write().await;
        let dead = match channels.get(&channel_id) {
            Some(tx) => {
                let _ = tx.send(event);
                tx.receiver_count() == 0
            }
            None => {
                tracing::debug!(%channel_id, "Progress event dropped, no subscribers");
                return;
            }
        };

        if dead {
            channels.remove(&channel_id);
        }
    }

    /// Number of channels currently registered
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = ProgressBus::new(16);
        let channel = Uuid::new_v4();
        let mut rx = bus.subscribe(channel).await;

        bus.publish(channel, ProgressEvent::at(30, "Fetching ingredients", "Ramen"))
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.percentage, 30);
        assert_eq!(event.dish_name, "Ramen");
        assert!(!event.is_error());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let bus = ProgressBus::new(16);

        bus.publish(Uuid::new_v4(), ProgressEvent::at(5, "Started", "Ramen"))
            .await;

        assert_eq!(bus.channel_count().await, 0);
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let bus = ProgressBus::new(16);
        let channel_a = Uuid::new_v4();
        let channel_b = Uuid::new_v4();
        let mut rx_a = bus.subscribe(channel_a).await;
        let mut rx_b = bus.subscribe(channel_b).await;

        bus.publish(channel_a, ProgressEvent::at(100, "Completed", "Ramen"))
            .await;

        assert_eq!(rx_a.recv().await.unwrap().percentage, 100);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned_on_publish() {
        let bus = ProgressBus::new(16);
        let channel = Uuid::new_v4();
        let rx = bus.subscribe(channel).await;
        drop(rx);

        bus.publish(channel, ProgressEvent::at(70, "Persisting", "Ramen"))
            .await;

        assert_eq!(bus.channel_count().await, 0);
    }

    #[test]
    fn error_events_carry_the_sentinel_percentage() {
        let event = ProgressEvent::error("Unknown dish", "Zzznonexistent");
        assert_eq!(event.percentage, ERROR_PERCENTAGE);
        assert!(event.is_error());
    }
}
