//! Ingress Router (C2, spec §4.2): chat and webhook entry points,
//! idempotency, and thread-placement logic.

pub mod chat;
pub mod idempotency;
pub mod webhook;

pub use chat::{ChatAck, ChatClient, ChatClientError, ChatEnvelope, ChatIngressError, on_chat_event};
pub use idempotency::IdempotencyStore;
pub use webhook::{WebhookAck, WebhookIngressError, WebhookRequest, build_work_item};
