//! Queue wiring: the concrete `aws-sdk-sqs`-backed [`Queue`] and the
//! three-queue bundle consumers operate against (spec §6 `queue_url_*`).

mod sqs;

use std::sync::Arc;

use revops_core::queue::Queue;

pub use sqs::SqsQueue;

/// The primary/delivery/deadletter queue trio every consumer is wired
/// against.
#[derive(Clone)]
pub struct QueueSet {
    /// Ingress queue: `WorkItem`s awaiting C3.
    pub primary: Arc<dyn Queue>,
    /// Delivery queue: `DeliveryJob`s awaiting C5.
    pub delivery: Arc<dyn Queue>,
    /// Terminal-failure sink.
    pub deadletter: Arc<dyn Queue>,
}
