//! Correlation identity for the enrichment pipeline
//!
//! A `CorrelationIdentity` is minted once per creation request and carried
//! unchanged through the queue, the store, and the progress stream. The
//! `message_id` correlates a request with its stored outcome; the
//! `channel_id` names the progress channel clients subscribe to.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity pair linking a request to its asynchronous outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationIdentity {
    /// Correlation key for status lookup and worker idempotency
    pub message_id: Uuid,
    /// Correlation key for the progress notification channel
    pub channel_id: Uuid,
}

impl CorrelationIdentity {
    /// Mint a fresh identity pair for a new request
    pub fn mint() -> Self {
        Self {
            message_id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
        }
    }
}
