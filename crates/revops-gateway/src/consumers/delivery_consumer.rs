//! C5 consumer loop: dequeues `DeliveryJob`s and drives them through
//! [`revops_core::delivery::deliver`], re-enqueuing retries and routing
//! permanent failures to the dead-letter queue.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use revops_core::delivery::{deliver, DeliveryPayload, DeliveryTransport, Outcome, RetryPolicy};
use revops_core::model::DeliveryJob;
use revops_core::queue::Queue;

use crate::queues::QueueSet;

const RECEIVE_WAIT: Duration = Duration::from_secs(20);

/// Dependencies the delivery consumer loop needs.
pub struct DeliveryConsumer {
    pub queues: QueueSet,
    pub transport: Arc<dyn DeliveryTransport>,
    pub retry_policy: RetryPolicy,
}

impl DeliveryConsumer {
    /// Run the delivery loop until `shutdown` reports true.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut rng = StdRng::from_entropy();
        while !*shutdown.borrow() {
            let message = match tokio::select! {
                result = self.queues.delivery.receive(RECEIVE_WAIT) => result,
                _ = shutdown.changed() => continue,
            } {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(error) => {
                    tracing::error!(error = %error, "delivery queue receive failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let job: DeliveryJob = match serde_json::from_str(&message.body) {
                Ok(job) => job,
                Err(error) => {
                    tracing::error!(error = %error, "dropping unparseable delivery job");
                    let _ = self.queues.delivery.delete(&message.receipt_handle).await;
                    continue;
                }
            };
            let payload: DeliveryPayload = match serde_json::from_str(&job.payload) {
                Ok(payload) => payload,
                Err(error) => {
                    tracing::error!(error = %error, delivery_id = %job.delivery_id, "dropping delivery job with unparseable payload");
                    let _ = self.route_to_deadletter(&job).await;
                    let _ = self.queues.delivery.delete(&message.receipt_handle).await;
                    continue;
                }
            };

            self.process(job, &payload, &mut rng).await;
            if let Err(error) = self.queues.delivery.delete(&message.receipt_handle).await {
                tracing::error!(error = %error, "failed to delete processed delivery job");
            }
        }
    }

    async fn process(&self, job: DeliveryJob, payload: &DeliveryPayload, rng: &mut StdRng) {
        let delivery_id = job.delivery_id;
        let intent_class = payload.header.clone();
        let attempt = job.attempt;
        let started_at = std::time::Instant::now();
        let now = chrono::Utc::now();

        let result = match deliver(job, payload, self.transport.as_ref(), &self.retry_policy, now, rng).await {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(delivery_id = %delivery_id, error = %error, "delivery job state transition rejected");
                return;
            }
        };

        let duration_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            delivery_id = %delivery_id,
            intent_class = %intent_class,
            attempt,
            outcome = ?result.outcome,
            duration_ms,
            "delivery attempt completed"
        );

        match result.outcome {
            Outcome::Success => {}
            Outcome::Retryable if !result.job.terminal_status.is_terminal() => {
                self.reenqueue_retry(&result.job, now).await;
            }
            Outcome::Retryable | Outcome::Terminal => {
                self.route_to_deadletter(&result.job).await.ok();
            }
        }
    }

    async fn reenqueue_retry(&self, job: &DeliveryJob, now: chrono::DateTime<chrono::Utc>) {
        let delay = (job.next_ready_at - now).to_std().unwrap_or_default();
        let Ok(body) = serde_json::to_string(job) else {
            tracing::error!(delivery_id = %job.delivery_id, "failed to serialize retry-scheduled delivery job");
            return;
        };
        if let Err(error) = self.queues.delivery.enqueue(body, Some(delay)).await {
            tracing::error!(delivery_id = %job.delivery_id, error = %error, "failed to re-enqueue delivery retry");
        }
    }

    async fn route_to_deadletter(&self, job: &DeliveryJob) -> Result<(), ()> {
        let body = serde_json::to_string(job).map_err(|error| {
            tracing::error!(delivery_id = %job.delivery_id, error = %error, "failed to serialize dead-lettered delivery job");
        })?;
        self.queues.deadletter.enqueue(body, None).await.map_err(|error| {
            tracing::error!(delivery_id = %job.delivery_id, error = %error, "dead-letter enqueue failed");
        })
    }
}
