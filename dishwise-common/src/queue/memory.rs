//! In-memory message queue
//!
//! Satisfies the same contract as the SQS client for tests and local runs.
//! Received messages move to an in-flight set until deleted; anything left
//! in flight can be pushed back to pending to exercise redelivery paths.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{MessageQueue, QueueError, ReceivedMessage};

#[derive(Debug, Clone)]
struct StoredMessage {
    delivery_id: String,
    body: String,
}

/// In-memory queue with redelivery support
#[derive(Default)]
pub struct MemoryQueue {
    pending: Mutex<VecDeque<StoredMessage>>,
    in_flight: Mutex<HashMap<String, StoredMessage>>,
    sent_bodies: Mutex<Vec<String>>,
    fail_sends: AtomicBool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `send` calls fail with a transport error
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `send` calls so far
    pub async fn sent_count(&self) -> usize {
        self.sent_bodies.lock().await.len()
    }

    /// Bodies recorded by successful `send` calls, in order
    pub async fn sent_bodies(&self) -> Vec<String> {
        self.sent_bodies.lock().await.clone()
    }

    /// Push every unacknowledged message back to pending
    pub async fn redeliver_in_flight(&self) {
        let mut in_flight = self.in_flight.lock().await;
        let mut pending = self.pending.lock().await;
        for (_, message) in in_flight.drain() {
            pending.push_back(message);
        }
    }

    /// Messages awaiting delivery
    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Messages delivered but not yet acknowledged
    pub async fn in_flight_len(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn send(&self, body: &str) -> Result<String, QueueError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(QueueError::Transport(
                "Queue unreachable (injected failure)".to_string(),
            ));
        }

        let delivery_id = Uuid::new_v4().to_string();
        self.pending.lock().await.push_back(StoredMessage {
            delivery_id: delivery_id.clone(),
            body: body.to_string(),
        });
        self.sent_bodies.lock().await.push(body.to_string());

        Ok(delivery_id)
    }

    async fn receive(&self) -> Result<Option<ReceivedMessage>, QueueError> {
        let message = self.pending.lock().await.pop_front();

        match message {
            Some(message) => {
                let receipt_handle = Uuid::new_v4().to_string();
                let received = ReceivedMessage {
                    delivery_id: message.delivery_id.clone(),
                    receipt_handle: receipt_handle.clone(),
                    body: message.body.clone(),
                };
                self.in_flight.lock().await.insert(receipt_handle, message);
                Ok(Some(received))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.in_flight.lock().await.remove(receipt_handle);
        Ok(())
    }
}
