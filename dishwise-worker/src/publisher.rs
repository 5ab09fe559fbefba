//! Progress publisher contract and HTTP implementation
//!
//! Publishing is best-effort: delivery failures are logged and swallowed.
//! A lost progress event never fails the job or alters the stored status.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use dishwise_common::events::ProgressEvent;

/// Timeout for progress publish requests; kept short so a slow notification
/// channel cannot stall enrichment
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort progress emitter keyed by channel identifier
#[async_trait]
pub trait ProgressPublisher: Send + Sync {
    /// Publish one event; never fails
    async fn publish(&self, channel_id: Uuid, event: &ProgressEvent);
}

/// Publisher that POSTs events to the API service's internal endpoint
pub struct HttpProgressPublisher {
    http_client: Client,
    api_base: String,
}

impl HttpProgressPublisher {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(PUBLISH_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            api_base: api_base.into(),
        }
    }
}

#[async_trait]
impl ProgressPublisher for HttpProgressPublisher {
    async fn publish(&self, channel_id: Uuid, event: &ProgressEvent) {
        let url = format!(
            "{}/internal/progress/{}",
            self.api_base.trim_end_matches('/'),
            channel_id
        );

        match self.http_client.post(&url).json(event).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(%channel_id, percentage = event.percentage, "Progress published");
            }
            Ok(response) => {
                warn!(
                    %channel_id,
                    status = %response.status(),
                    "Progress publish rejected; dropping event"
                );
            }
            Err(e) => {
                warn!(%channel_id, "Progress publish failed: {}; dropping event", e);
            }
        }
    }
}

/// Publisher that drops every event
pub struct NoopPublisher;

#[async_trait]
impl ProgressPublisher for NoopPublisher {
    async fn publish(&self, _channel_id: Uuid, _event: &ProgressEvent) {}
}

/// Publisher that records events for assertions in tests
#[derive(Default)]
pub struct CollectingPublisher {
    events: Arc<Mutex<Vec<(Uuid, ProgressEvent)>>>,
}

impl CollectingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All published events in publish order
    pub async fn events(&self) -> Vec<(Uuid, ProgressEvent)> {
        self.events.lock().await.clone()
    }

    /// Events published to one channel, in order
    pub async fn events_for(&self, channel_id: Uuid) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|(channel, _)| *channel == channel_id)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

#[async_trait]
impl ProgressPublisher for CollectingPublisher {
    async fn publish(&self, channel_id: Uuid, event: &ProgressEvent) {
        self.events.lock().await.push((channel_id, event.clone()));
    }
}
