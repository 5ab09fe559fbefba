//! Dish entity and status state machine
//!
//! A dish row moves through exactly one lifecycle:
//! `processing → completed` or `processing → failed`. Terminal states never
//! regress; the store's guarded update enforces this at the row level and
//! `DishStatus::can_transition_to` expresses the same rule in memory.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::CorrelationIdentity;

/// Enrichment status of a stored dish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DishStatus {
    /// Queued or being enriched; ingredients not yet populated
    Processing,
    /// Enrichment and persistence succeeded; ingredients populated
    Completed,
    /// Enrichment or persistence failed; ingredients remain empty
    Failed,
}

impl DishStatus {
    /// True for states that permit no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, DishStatus::Completed | DishStatus::Failed)
    }

    /// Whether a transition to `next` is permitted
    ///
    /// Re-asserting the current state is always a permitted no-op, so a
    /// redelivered message that re-marks an already-failed dish is harmless.
    pub fn can_transition_to(&self, next: DishStatus) -> bool {
        match self {
            DishStatus::Processing => true,
            current => *current == next,
        }
    }

    /// Database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DishStatus::Processing => "processing",
            DishStatus::Completed => "completed",
            DishStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DishStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(DishStatus::Processing),
            "completed" => Ok(DishStatus::Completed),
            "failed" => Ok(DishStatus::Failed),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown dish status: {}",
                other
            ))),
        }
    }
}

/// Persistent dish entity
///
/// `id` is store-assigned and absent until first persisted. `message_id` and
/// `channel_id` carry the correlation identity of the request that created
/// the row; `channel_id` may be absent on rows created outside the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub id: Option<i64>,
    pub name: String,
    pub ingredients: Vec<String>,
    pub status: DishStatus,
    pub message_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
}

impl Dish {
    /// Build the first-touch row for a newly dequeued request
    pub fn processing(name: impl Into<String>, identity: &CorrelationIdentity) -> Self {
        Self {
            id: None,
            name: name.into(),
            ingredients: Vec::new(),
            status: DishStatus::Processing,
            message_id: Some(identity.message_id),
            channel_id: Some(identity.channel_id),
        }
    }

    /// True once the dish has reached `completed` or `failed`
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
