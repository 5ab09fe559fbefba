//! Producer: accept a dish creation request and hand it to the queue
//!
//! The submitter validates the name, mints a fresh correlation identity,
//! and enqueues the request. It never writes to the dish store; the worker
//! performs first-touch creation, so a failed enqueue leaves no partial
//! state anywhere.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use dishwise_common::queue::{MessageQueue, QueueError, QueueMessage};
use dishwise_common::validate::validate_dish_name;
use dishwise_common::CorrelationIdentity;

/// Submission failures surfaced synchronously to the caller
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Input failed the shared dish-name rule; nothing was enqueued
    #[error("Invalid dish name: {0}")]
    Validation(String),

    /// Queue transport failure; the caller should retry the whole request
    #[error("Failed to enqueue dish request: {0}")]
    Queue(#[from] QueueError),

    /// Payload construction failure
    #[error("Failed to build queue message: {0}")]
    Encoding(String),
}

/// Accepted-for-processing receipt returned to the caller
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedInfo {
    pub dish_name: String,
    pub message_id: Uuid,
    pub channel_id: Uuid,
}

/// Create-request handler backed by an injected message queue
pub struct DishSubmitter {
    queue: Arc<dyn MessageQueue>,
}

impl DishSubmitter {
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self { queue }
    }

    /// Validate and enqueue one enrichment request
    ///
    /// Returns 202-style acceptance info; the caller observes completion by
    /// polling status or subscribing to the progress channel.
    pub async fn submit(&self, dish_name: &str) -> Result<AcceptedInfo, SubmitError> {
        let name = validate_dish_name(dish_name).map_err(|e| {
            warn!(dish_name, "Rejected dish submission: {}", e);
            SubmitError::Validation(e.to_string())
        })?;

        let identity = CorrelationIdentity::mint();
        let message = QueueMessage::new(name, &identity);
        let body = message
            .encode()
            .map_err(|e| SubmitError::Encoding(e.to_string()))?;

        let delivery_id = self.queue.send(&body).await?;

        info!(
            dish_name = name,
            message_id = %identity.message_id,
            %delivery_id,
            "Dish request enqueued"
        );

        Ok(AcceptedInfo {
            dish_name: name.to_string(),
            message_id: identity.message_id,
            channel_id: identity.channel_id,
        })
    }
}
