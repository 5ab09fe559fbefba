//! Message queue contract and payload types
//!
//! The queue delivers at-least-once and unordered. Consumers acknowledge by
//! deleting a message via its receipt handle; an unacknowledged message is
//! redelivered under the transport's own visibility policy, so processing
//! must stay idempotent.

pub mod memory;
pub mod sqs;

pub use memory::MemoryQueue;
pub use sqs::SqsQueue;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::identity::CorrelationIdentity;

/// Queue transport errors
#[derive(Debug, Error)]
pub enum QueueError {
    /// Network-level failure reaching the queue endpoint
    #[error("Queue transport error: {0}")]
    Transport(String),

    /// Queue endpoint answered with a non-success status
    #[error("Queue API error: {0}")]
    Api(String),

    /// Response body could not be decoded
    #[error("Queue response parse error: {0}")]
    Parse(String),
}

/// Enqueue payload for one enrichment request
///
/// Immutable after construction; serialized as a flat JSON document for
/// queue transit. The wire field for `enqueued_at` is `timestamp`, integer
/// epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub dish_name: String,
    pub message_id: Uuid,
    pub channel_id: Uuid,
    #[serde(rename = "timestamp")]
    pub enqueued_at: i64,
}

impl QueueMessage {
    /// Build the payload for a validated request
    pub fn new(dish_name: impl Into<String>, identity: &CorrelationIdentity) -> Self {
        Self {
            dish_name: dish_name.into(),
            message_id: identity.message_id,
            channel_id: identity.channel_id,
            enqueued_at: chrono::Utc::now().timestamp(),
        }
    }

    /// The correlation identity carried by this message
    pub fn identity(&self) -> CorrelationIdentity {
        CorrelationIdentity {
            message_id: self.message_id,
            channel_id: self.channel_id,
        }
    }

    /// Serialize for queue transit
    pub fn encode(&self) -> crate::Result<String> {
        serde_json::to_string(self)
            .map_err(|e| crate::Error::Internal(format!("Failed to encode queue message: {}", e)))
    }

    /// Parse a delivered message body
    pub fn decode(body: &str) -> crate::Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| crate::Error::InvalidInput(format!("Malformed queue message: {}", e)))
    }
}

/// One delivered message awaiting acknowledgement
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Queue-assigned delivery identifier
    pub delivery_id: String,
    /// Token for acknowledging this delivery
    pub receipt_handle: String,
    /// Raw payload as sent by the producer
    pub body: String,
}

/// Message queue contract consumed by producer and worker
///
/// Production and test implementations satisfy the same interface so either
/// can be injected at construction time.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Enqueue a payload, returning the queue-assigned delivery id
    async fn send(&self, body: &str) -> Result<String, QueueError>;

    /// Long-poll for at most one message
    async fn receive(&self) -> Result<Option<ReceivedMessage>, QueueError>;

    /// Acknowledge a delivery so it is not redelivered
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}
