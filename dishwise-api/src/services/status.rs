//! Status correlator: map a message id to the current dish status
//!
//! Reads the dish store independently of the queue. Non-terminal and failed
//! lookups return only the correlation key; completed lookups return the
//! full projection so polling clients can tell "still working" from "done"
//! without an event log.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use dishwise_common::db::DishStore;
use dishwise_common::{DishStatus, Error, Result};

/// Polling payload, shaped by the dish's current status
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusPayload {
    Processing {
        message_id: Uuid,
    },
    Failed {
        message_id: Uuid,
    },
    Completed {
        message_id: Uuid,
        name: String,
        ingredients: Vec<String>,
    },
}

/// Fetch-status handler backed by an injected dish store
pub struct StatusResolver {
    store: Arc<dyn DishStore>,
}

impl StatusResolver {
    pub fn new(store: Arc<dyn DishStore>) -> Self {
        Self { store }
    }

    /// Resolve the current status for one correlation group
    pub async fn status_for(&self, message_id: Uuid) -> Result<StatusPayload> {
        let dish = self
            .store
            .find_by_message_id(message_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No dish found for message ID: {}", message_id)))?;

        let payload = match dish.status {
            DishStatus::Processing => StatusPayload::Processing { message_id },
            DishStatus::Failed => StatusPayload::Failed { message_id },
            DishStatus::Completed => StatusPayload::Completed {
                message_id,
                name: dish.name,
                ingredients: dish.ingredients,
            },
        };

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dishwise_common::db::MemoryDishStore;
    use dishwise_common::{CorrelationIdentity, Dish};

    async fn seed(store: &MemoryDishStore, status: DishStatus) -> CorrelationIdentity {
        let identity = CorrelationIdentity::mint();
        let mut dish = Dish::processing("Ramen", &identity);
        dish.status = status;
        if status == DishStatus::Completed {
            dish.ingredients = vec!["Noodles".to_string(), "Broth".to_string()];
        }
        store.create_or_update(&dish).await.unwrap();
        identity
    }

    #[tokio::test]
    async fn unknown_message_id_is_not_found() {
        let resolver = StatusResolver::new(Arc::new(MemoryDishStore::new()));

        let err = resolver.status_for(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn processing_returns_only_the_correlation_key() {
        let store = Arc::new(MemoryDishStore::new());
        let identity = seed(&store, DishStatus::Processing).await;
        let resolver = StatusResolver::new(store);

        let payload = resolver.status_for(identity.message_id).await.unwrap();
        assert_eq!(
            payload,
            StatusPayload::Processing {
                message_id: identity.message_id
            }
        );
    }

    #[tokio::test]
    async fn failed_returns_only_the_correlation_key() {
        let store = Arc::new(MemoryDishStore::new());
        let identity = seed(&store, DishStatus::Failed).await;
        let resolver = StatusResolver::new(store);

        let payload = resolver.status_for(identity.message_id).await.unwrap();
        assert_eq!(
            payload,
            StatusPayload::Failed {
                message_id: identity.message_id
            }
        );
    }

    #[tokio::test]
    async fn completed_returns_the_full_projection() {
        let store = Arc::new(MemoryDishStore::new());
        let identity = seed(&store, DishStatus::Completed).await;
        let resolver = StatusResolver::new(store);

        let payload = resolver.status_for(identity.message_id).await.unwrap();
        match payload {
            StatusPayload::Completed {
                message_id,
                name,
                ingredients,
            } => {
                assert_eq!(message_id, identity.message_id);
                assert_eq!(name, "Ramen");
                assert_eq!(ingredients, vec!["Noodles", "Broth"]);
            }
            other => panic!("Expected completed payload, got {:?}", other),
        }
    }

    #[test]
    fn payload_serializes_with_status_tag() {
        let payload = StatusPayload::Processing {
            message_id: Uuid::new_v4(),
        };
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["status"], "processing");
        assert!(json["message_id"].is_string());
        assert!(json.get("ingredients").is_none());
    }
}
