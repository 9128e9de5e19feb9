//! `Queue` port (spec §6 "External Interfaces").
//!
//! Modeled on `BSteffaniak-crime-map/packages/r2`'s composition-root AWS
//! client wiring (spec §9 Design Notes: "replace module-level AWS clients
//! ... with a composition root"). `revops-gateway` provides the concrete
//! `aws-sdk-sqs`-backed implementation for `queue_url_primary`,
//! `queue_url_delivery`, and `queue_url_deadletter`; an in-memory double
//! lives alongside this trait for tests and local runs.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors raised by a [`Queue`] implementation.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue is unavailable or refused the enqueue (spec §4.2
    /// "Back-pressure").
    #[error("queue unavailable: {0}")]
    Unavailable(String),
    /// The receive deadline elapsed with no message delivered.
    #[error("queue receive timed out")]
    Timeout,
}

/// A message handed out by [`Queue::receive`], carrying an opaque handle
/// used to `delete` or `change_visibility` it.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// An opaque receipt handle identifying this particular receive.
    pub receipt_handle: String,
    /// The serialized message body.
    pub body: String,
}

/// A durable, at-least-once queue (spec §6). `WorkItem`s, `DeliveryJob`s,
/// and dead-letter payloads all flow over implementations of this trait,
/// serialized as JSON bodies by the caller.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Enqueue `body`, optionally not visible for receipt until `delay`
    /// has elapsed (used by C5 to implement `next_ready_at`).
    ///
    /// # Errors
    /// Returns [`QueueError::Unavailable`] if the queue refuses the
    /// enqueue.
    async fn enqueue(&self, body: String, delay: Option<Duration>) -> Result<(), QueueError>;

    /// Receive up to one message, waiting at most `wait` for one to
    /// become available.
    ///
    /// # Errors
    /// Returns [`QueueError::Unavailable`] on backend failure. Returns
    /// `Ok(None)` (not an error) when `wait` elapses with nothing
    /// available.
    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>, QueueError>;

    /// Permanently remove a message after successful processing.
    ///
    /// # Errors
    /// Returns [`QueueError::Unavailable`] on backend failure.
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;

    /// Extend (or shorten) the in-flight visibility timeout of a message
    /// still being processed.
    ///
    /// # Errors
    /// Returns [`QueueError::Unavailable`] on backend failure.
    async fn change_visibility(
        &self,
        receipt_handle: &str,
        timeout: Duration,
    ) -> Result<(), QueueError>;
}

struct DelayedMessage {
    body: String,
    ready_at: DateTime<Utc>,
}

/// An in-process, `tokio::sync::Mutex`-guarded queue for tests and local
/// runs.
#[derive(Default)]
pub struct InMemoryQueue {
    messages: Mutex<VecDeque<DelayedMessage>>,
}

impl InMemoryQueue {
    /// Construct an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages currently enqueued (ready or delayed), for test
    /// assertions.
    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    /// Whether the queue currently holds no messages.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(&self, body: String, delay: Option<Duration>) -> Result<(), QueueError> {
        let ready_at = Utc::now()
            + delay
                .and_then(|d| chrono::Duration::from_std(d).ok())
                .unwrap_or_default();
        self.messages
            .lock()
            .await
            .push_back(DelayedMessage { body, ready_at });
        Ok(())
    }

    async fn receive(&self, _wait: Duration) -> Result<Option<QueueMessage>, QueueError> {
        let mut messages = self.messages.lock().await;
        let now = Utc::now();
        let position = messages.iter().position(|m| m.ready_at <= now);
        let Some(position) = position else {
            return Ok(None);
        };
        let message = messages.remove(position).expect("position was just found");
        Ok(Some(QueueMessage {
            receipt_handle: uuid::Uuid::new_v4().to_string(),
            body: message.body,
        }))
    }

    async fn delete(&self, _receipt_handle: &str) -> Result<(), QueueError> {
        Ok(())
    }

    async fn change_visibility(
        &self,
        _receipt_handle: &str,
        _timeout: Duration,
    ) -> Result<(), QueueError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_then_receive_round_trips_body() {
        let queue = InMemoryQueue::new();
        queue.enqueue("hello".into(), None).await.unwrap();
        let message = queue.receive(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(message.body, "hello");
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn delayed_message_not_received_before_ready() {
        let queue = InMemoryQueue::new();
        queue
            .enqueue("later".into(), Some(Duration::from_secs(3600)))
            .await
            .unwrap();
        let received = queue.receive(Duration::from_millis(10)).await.unwrap();
        assert!(received.is_none());
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn receive_on_empty_queue_returns_none() {
        let queue = InMemoryQueue::new();
        assert!(queue.receive(Duration::from_millis(10)).await.unwrap().is_none());
    }
}
