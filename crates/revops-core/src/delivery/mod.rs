//! Delivery Engine (C5, spec §4.5): posting classified responses to their
//! resolved downstream endpoint with backoff-and-retry.

pub mod backoff;
pub mod engine;
pub mod payload;

pub use backoff::{base_delay, jittered_delay, RetryPolicy};
pub use engine::{classify_status, classify_transport_error, deliver, DeliveryEngineError, DeliveryResult, DeliveryTransport, Outcome, TransportError};
pub use payload::{strip_markdown, DeliveryMetadata, DeliveryPayload};
