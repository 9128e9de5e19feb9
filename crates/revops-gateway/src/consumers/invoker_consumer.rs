//! C3/C6 consumer loop: dequeues `WorkItem`s, invokes the agent, records
//! and exports the conversation. Chat-origin items terminate here, their
//! answer already delivered via the thread update `consume` performs.
//! Webhook-origin items continue on to C4/C5: classify the response and
//! hand a `DeliveryJob` off to the delivery queue (or dead-letter if no
//! target is configured for the classified intent).

use std::sync::Arc;
use std::time::Duration;

use revops_core::agent::runtime::AgentRuntime;
use revops_core::agent::{ProgressThrottle, consume};
use revops_core::clock::{Clock, SystemClock};
use revops_core::delivery::DeliveryPayload;
use revops_core::ingress::ChatClient;
use revops_core::model::{DeliveryJob, WorkItem, WorkItemOrigin};
use revops_core::object_store::ObjectStore;
use revops_core::queue::Queue;
use revops_core::{classifier, recorder};

use crate::config::{DeliveryConfig, NO_TARGET_CONFIGURED};
use crate::queues::QueueSet;

const RECEIVE_WAIT: Duration = Duration::from_secs(20);

/// Dependencies the invoker consumer loop needs, bundled so `main.rs`
/// only has to build this once per run.
pub struct InvokerConsumer {
    pub queues: QueueSet,
    pub object_store: Arc<dyn ObjectStore>,
    pub runtime: Arc<dyn AgentRuntime>,
    pub chat_client: Arc<dyn ChatClient>,
    pub delivery_config: DeliveryConfig,
    pub progress_throttle: ProgressThrottle,
}

impl InvokerConsumer {
    /// Run the consume loop until `shutdown` reports true.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let clock = SystemClock;
        while !*shutdown.borrow() {
            let message = match tokio::select! {
                result = self.queues.primary.receive(RECEIVE_WAIT) => result,
                _ = shutdown.changed() => continue,
            } {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(error) => {
                    tracing::error!(error = %error, "primary queue receive failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let work_item: WorkItem = match serde_json::from_str(&message.body) {
                Ok(item) => item,
                Err(error) => {
                    tracing::error!(error = %error, "dropping unparseable work item");
                    let _ = self.queues.primary.delete(&message.receipt_handle).await;
                    continue;
                }
            };

            self.process(&work_item, &clock).await;
            if let Err(error) = self.queues.primary.delete(&message.receipt_handle).await {
                tracing::error!(error = %error, "failed to delete processed work item");
            }
        }
    }

    async fn process(&self, work_item: &WorkItem, clock: &dyn Clock) {
        let outcome = consume(
            work_item,
            self.runtime.as_ref(),
            self.chat_client.as_ref(),
            clock,
            &self.progress_throttle,
        )
        .await;

        let record = recorder::build_record(&outcome.session, &work_item.origin, &work_item.query, None);
        let exported_at = clock.now();

        if let Err(error) = recorder::export_conversation(self.object_store.as_ref(), &record, exported_at).await {
            tracing::error!(error = %error, conversation_id = %record.conversation_id, "conversation export failed");
        }

        if !matches!(work_item.origin, WorkItemOrigin::Webhook { .. }) {
            // Chat origin terminates at the thread update `consume` already
            // performed; only webhook-origin work items flow on to C4/C5.
            return;
        }

        let intent_class = classifier::classify(&record.final_response, &record.user_query);
        let processing_time_ms = record.quality_signals.total_duration_ms;
        let payload = DeliveryPayload::new(
            intent_class,
            record.final_response.clone(),
            record.agents_involved(),
            record.conversation_id.clone(),
            processing_time_ms,
            exported_at,
        );
        let payload_json = match payload.to_json() {
            Ok(json) => json,
            Err(error) => {
                tracing::error!(error = %error, "failed to serialize delivery payload");
                return;
            }
        };

        let Some(target_url) = self.delivery_config.target_for(intent_class) else {
            tracing::warn!(
                conversation_id = %record.conversation_id,
                intent_class = %intent_class,
                reason = NO_TARGET_CONFIGURED,
                "no delivery target configured for intent class, routing to dead-letter"
            );
            if let Err(error) = self.queues.deadletter.enqueue(payload_json, None).await {
                tracing::error!(error = %error, "dead-letter enqueue failed");
            }
            return;
        };

        let job = DeliveryJob::new(
            record.conversation_id.clone(),
            target_url,
            payload_json,
            self.delivery_config.retry.max_attempts,
            exported_at,
        );
        let job_json = match serde_json::to_string(&job) {
            Ok(json) => json,
            Err(error) => {
                tracing::error!(error = %error, "failed to serialize delivery job");
                return;
            }
        };
        if let Err(error) = self.queues.delivery.enqueue(job_json, None).await {
            tracing::error!(error = %error, "delivery queue enqueue failed");
        }
    }
}
