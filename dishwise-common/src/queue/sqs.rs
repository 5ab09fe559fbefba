//! SQS-compatible queue client
//!
//! Speaks the SQS JSON protocol (`X-Amz-Target: AmazonSQS.<Action>`)
//! against a configurable endpoint, so the same client works for AWS SQS
//! and local SQS-compatible brokers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MessageQueue, QueueError, ReceivedMessage};

/// Target header prefix for the SQS JSON protocol
const TARGET_PREFIX: &str = "AmazonSQS";

/// Content type required by the SQS JSON protocol
const AMZ_JSON: &str = "application/x-amz-json-1.0";

/// Default timeout for queue API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Long-poll wait applied to receive calls
const RECEIVE_WAIT_SECONDS: u64 = 10;

/// SQS-compatible message queue client
pub struct SqsQueue {
    http_client: Client,
    endpoint: String,
    queue_url: String,
}

impl SqsQueue {
    /// Create a client for `queue_url` served at `endpoint`
    pub fn new(endpoint: impl Into<String>, queue_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            endpoint: endpoint.into(),
            queue_url: queue_url.into(),
        }
    }

    async fn post<T: Serialize>(
        &self,
        action: &str,
        request: &T,
    ) -> Result<reqwest::Response, QueueError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, action))
            .json(request)
            .send()
            .await
            .map_err(|e| QueueError::Transport(format!("{} request failed: {}", action, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QueueError::Api(format!(
                "{} returned {}: {}",
                action, status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn send(&self, body: &str) -> Result<String, QueueError> {
        let request = SendMessageRequest {
            queue_url: &self.queue_url,
            message_body: body,
        };

        let response = self
            .post("SendMessage", &request)
            .await?
            .json::<SendMessageResponse>()
            .await
            .map_err(|e| QueueError::Parse(format!("SendMessage response: {}", e)))?;

        debug!(message_id = %response.message_id, "Message enqueued");
        Ok(response.message_id)
    }

    async fn receive(&self) -> Result<Option<ReceivedMessage>, QueueError> {
        let request = ReceiveMessageRequest {
            queue_url: &self.queue_url,
            max_number_of_messages: 1,
            wait_time_seconds: RECEIVE_WAIT_SECONDS,
        };

        let response = self
            .post("ReceiveMessage", &request)
            .await?
            .json::<ReceiveMessageResponse>()
            .await
            .map_err(|e| QueueError::Parse(format!("ReceiveMessage response: {}", e)))?;

        Ok(response.messages.into_iter().next().map(|m| ReceivedMessage {
            delivery_id: m.message_id,
            receipt_handle: m.receipt_handle,
            body: m.body,
        }))
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let request = DeleteMessageRequest {
            queue_url: &self.queue_url,
            receipt_handle,
        };

        self.post("DeleteMessage", &request).await?;
        Ok(())
    }
}

// ============================================================================
// SQS JSON Protocol Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageRequest<'a> {
    queue_url: &'a str,
    message_body: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageResponse {
    message_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageRequest<'a> {
    queue_url: &'a str,
    max_number_of_messages: u64,
    wait_time_seconds: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageResponse {
    #[serde(default)]
    messages: Vec<SqsMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SqsMessage {
    message_id: String,
    receipt_handle: String,
    body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteMessageRequest<'a> {
    queue_url: &'a str,
    receipt_handle: &'a str,
}
