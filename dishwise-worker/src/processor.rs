//! The worker state machine
//!
//! One dequeued message moves through locate-or-create, enriching,
//! persisting, and a terminal publish. Uniqueness is enforced by
//! `message_id`: redelivery of a message whose dish is already terminal
//! returns immediately so the consumer can acknowledge the duplicate.
//! Enrichment and persistence failures both mark the dish `failed` and
//! publish a negative-percentage event before the error propagates to the
//! consumer loop.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};

use dishwise_common::db::DishStore;
use dishwise_common::events::ProgressEvent;
use dishwise_common::queue::QueueMessage;
use dishwise_common::{CorrelationIdentity, Dish, DishStatus};

use crate::enrich::{EnrichmentError, IngredientProvider};
use crate::publisher::ProgressPublisher;

/// Default deadline for one enrichment call
const DEFAULT_ENRICHMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Happy-path progress checkpoints
const PCT_STARTED: i32 = 5;
const PCT_ENRICHING: i32 = 30;
const PCT_PERSISTING: i32 = 70;
const PCT_COMPLETED: i32 = 100;

/// Processing failures returned to the consumer loop
///
/// The consumer acknowledges the message only on `Ok`; an error leaves the
/// message for the transport's redelivery/DLQ policy.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Provider failure, timeout, or unknown dish
    #[error("Enrichment failed: {0}")]
    Enrichment(#[from] EnrichmentError),

    /// Store failure while creating or updating the dish row
    #[error("Persistence failed: {0}")]
    Persistence(String),
}

/// Worker over one injected store, provider, and publisher
pub struct DishProcessor {
    store: Arc<dyn DishStore>,
    provider: Arc<dyn IngredientProvider>,
    publisher: Arc<dyn ProgressPublisher>,
    enrichment_timeout: Duration,
}

impl DishProcessor {
    pub fn new(
        store: Arc<dyn DishStore>,
        provider: Arc<dyn IngredientProvider>,
        publisher: Arc<dyn ProgressPublisher>,
    ) -> Self {
        Self {
            store,
            provider,
            publisher,
            enrichment_timeout: DEFAULT_ENRICHMENT_TIMEOUT,
        }
    }

    /// Override the enrichment deadline
    pub fn with_enrichment_timeout(mut self, enrichment_timeout: Duration) -> Self {
        self.enrichment_timeout = enrichment_timeout;
        self
    }

    /// Process one dequeued message to its terminal state
    pub async fn process(&self, message: &QueueMessage) -> Result<Dish, ProcessError> {
        let identity = message.identity();
        let name = message.dish_name.as_str();

        // located_or_created: message_id is the idempotency key
        let dish = match self.store.find_by_message_id(identity.message_id).await {
            Ok(Some(existing)) if existing.is_terminal() => {
                info!(
                    message_id = %identity.message_id,
                    status = %existing.status,
                    "Redelivered message for terminal dish; acknowledging"
                );
                return Ok(existing);
            }
            Ok(Some(existing)) => existing,
            Ok(None) => {
                let first_touch = Dish::processing(name, &identity);
                match self.store.create_or_update(&first_touch).await {
                    Ok(created) => created,
                    Err(e) => {
                        // No row to mark failed yet; the error event still
                        // tells subscribers the request is dead
                        self.publish_error(&identity, name, &e.to_string()).await;
                        return Err(ProcessError::Persistence(e.to_string()));
                    }
                }
            }
            Err(e) => {
                self.publish_error(&identity, name, &e.to_string()).await;
                return Err(ProcessError::Persistence(e.to_string()));
            }
        };

        self.publish(&identity, PCT_STARTED, "Started processing", name)
            .await;
        self.publish(&identity, PCT_ENRICHING, "Fetching ingredients", name)
            .await;

        // enriching: bounded by the configured deadline
        let ingredients = match timeout(
            self.enrichment_timeout,
            self.provider.fetch_ingredients(name),
        )
        .await
        {
            Ok(Ok(ingredients)) => ingredients,
            Ok(Err(e)) => {
                self.fail(&identity, name, &e.to_string()).await;
                return Err(e.into());
            }
            Err(_) => {
                let e = EnrichmentError::Timeout(name.to_string());
                self.fail(&identity, name, &e.to_string()).await;
                return Err(e.into());
            }
        };

        self.publish(&identity, PCT_PERSISTING, "Saving dish", name)
            .await;

        // persisting: same row, ingredients populated, terminal status
        let completed = Dish {
            ingredients,
            status: DishStatus::Completed,
            ..dish
        };

        let stored = match self.store.create_or_update(&completed).await {
            Ok(stored) => stored,
            Err(e) => {
                self.fail(&identity, name, &e.to_string()).await;
                return Err(ProcessError::Persistence(e.to_string()));
            }
        };

        self.publish(&identity, PCT_COMPLETED, "Completed", name)
            .await;
        info!(
            message_id = %identity.message_id,
            dish_name = name,
            ingredient_count = stored.ingredients.len(),
            "Dish enrichment completed"
        );

        Ok(stored)
    }

    /// Mark the dish failed and notify subscribers
    async fn fail(&self, identity: &CorrelationIdentity, name: &str, reason: &str) {
        warn!(
            message_id = %identity.message_id,
            dish_name = name,
            "Dish enrichment failed: {}",
            reason
        );

        if let Err(e) = self
            .store
            .update_status(identity.message_id, DishStatus::Failed)
            .await
        {
            warn!(
                message_id = %identity.message_id,
                "Failed to record failed status: {}",
                e
            );
        }

        self.publish_error(identity, name, reason).await;
    }

    async fn publish(
        &self,
        identity: &CorrelationIdentity,
        percentage: i32,
        message: &str,
        name: &str,
    ) {
        self.publisher
            .publish(identity.channel_id, &ProgressEvent::at(percentage, message, name))
            .await;
    }

    async fn publish_error(&self, identity: &CorrelationIdentity, name: &str, reason: &str) {
        self.publisher
            .publish(identity.channel_id, &ProgressEvent::error(reason, name))
            .await;
    }
}
