//! `aws-sdk-sqs`-backed [`Queue`] implementation.
//!
//! Grounded in `BSteffaniak-crime-map/packages/r2`'s composition-root AWS
//! client wiring: one shared `aws_sdk_sqs::Client` constructed once at
//! startup, with each queue's URL supplied per-instance rather than
//! re-reading configuration per call.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::Client;

use revops_core::queue::{Queue, QueueError, QueueMessage};

/// Visibility timeout applied while a message is dequeued for processing.
const VISIBILITY_TIMEOUT_SECS: i32 = 300;

/// An SQS queue, addressed by its full queue URL.
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    /// Construct a queue handle bound to `queue_url`, sharing `client`
    /// across every [`SqsQueue`] the gateway holds.
    #[must_use]
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl Queue for SqsQueue {
    async fn enqueue(&self, body: String, delay: Option<Duration>) -> Result<(), QueueError> {
        let delay_seconds = delay.map_or(0, |d| i32::try_from(d.as_secs()).unwrap_or(i32::MAX));
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .delay_seconds(delay_seconds)
            .send()
            .await
            .map_err(|err| QueueError::Unavailable(err.to_string()))?;
        Ok(())
    }

    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>, QueueError> {
        let wait_seconds = i32::try_from(wait.as_secs().min(20)).unwrap_or(20);
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(wait_seconds)
            .send()
            .await
            .map_err(|err| QueueError::Unavailable(err.to_string()))?;

        let Some(message) = response.messages().first() else {
            return Ok(None);
        };
        let (Some(body), Some(receipt_handle)) = (message.body(), message.receipt_handle()) else {
            return Err(QueueError::Unavailable(
                "SQS message missing body or receipt handle".into(),
            ));
        };
        Ok(Some(QueueMessage {
            receipt_handle: receipt_handle.to_owned(),
            body: body.to_owned(),
        }))
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|err| QueueError::Unavailable(err.to_string()))?;
        Ok(())
    }

    async fn change_visibility(
        &self,
        receipt_handle: &str,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        let timeout_seconds = i32::try_from(timeout.as_secs())
            .unwrap_or(VISIBILITY_TIMEOUT_SECS);
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(timeout_seconds)
            .send()
            .await
            .map_err(|err| QueueError::Unavailable(err.to_string()))?;
        Ok(())
    }
}
