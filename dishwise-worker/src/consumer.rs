//! Queue consumption loop
//!
//! Pulls one message at a time, runs the processor, and acknowledges only
//! on success. Failed or malformed messages are left in flight so the
//! transport's own redelivery and dead-letter policy decides their fate;
//! the processor's idempotency makes redelivery safe.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use dishwise_common::queue::{MessageQueue, QueueMessage, ReceivedMessage};

use crate::processor::DishProcessor;

/// Pause after a receive error before polling again
const DEFAULT_RECEIVE_BACKOFF: Duration = Duration::from_secs(5);

/// Pause after an empty receive; the SQS client long-polls on its own, this
/// only keeps the in-memory queue from spinning
const IDLE_PAUSE: Duration = Duration::from_millis(50);

/// Long-lived consumer over one queue and processor
pub struct Consumer {
    queue: Arc<dyn MessageQueue>,
    processor: Arc<DishProcessor>,
    cancel: CancellationToken,
    receive_backoff: Duration,
}

impl Consumer {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        processor: Arc<DishProcessor>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queue,
            processor,
            cancel,
            receive_backoff: DEFAULT_RECEIVE_BACKOFF,
        }
    }

    /// Override the post-error polling pause
    pub fn with_receive_backoff(mut self, receive_backoff: Duration) -> Self {
        self.receive_backoff = receive_backoff;
        self
    }

    /// Run until cancelled
    pub async fn run(&self) {
        info!("Consumer started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Consumer shutting down");
                    break;
                }
                received = self.queue.receive() => match received {
                    Ok(Some(message)) => self.handle(message).await,
                    Ok(None) => {
                        // Long poll expired with nothing to do
                        sleep(IDLE_PAUSE).await;
                    }
                    Err(e) => {
                        warn!("Queue receive failed: {}; backing off", e);
                        sleep(self.receive_backoff).await;
                    }
                }
            }
        }
    }

    /// Process one delivery and acknowledge it on success
    pub async fn handle(&self, received: ReceivedMessage) {
        let message = match QueueMessage::decode(&received.body) {
            Ok(message) => message,
            Err(e) => {
                // Fatal for this payload; redelivery and dead-lettering are
                // the transport's concern
                error!(
                    delivery_id = %received.delivery_id,
                    "Discarding decision left to transport, malformed payload: {}",
                    e
                );
                return;
            }
        };

        info!(
            message_id = %message.message_id,
            dish_name = %message.dish_name,
            "Processing dish request"
        );

        match self.processor.process(&message).await {
            Ok(dish) => {
                if let Err(e) = self.queue.delete(&received.receipt_handle).await {
                    // The next delivery finds a terminal dish and re-acks
                    warn!(
                        message_id = %message.message_id,
                        "Failed to acknowledge message: {}",
                        e
                    );
                } else {
                    info!(
                        message_id = %message.message_id,
                        dish_name = %dish.name,
                        status = %dish.status,
                        "Message acknowledged"
                    );
                }
            }
            Err(e) => {
                warn!(
                    message_id = %message.message_id,
                    "Processing failed, leaving message for redelivery: {}",
                    e
                );
            }
        }
    }
}
