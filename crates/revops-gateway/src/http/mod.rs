//! HTTP ingress surface (C1/C2): the axum router fronting chat and
//! webhook entry points.

mod chat;
mod webhook;

use std::sync::Arc;

use axum::Router;
use axum::routing::post;

use crate::queues::QueueSet;
use revops_core::ingress::{ChatClient, IdempotencyStore};

/// Shared state reachable by every handler.
pub struct AppState {
    /// The three durable queues (primary/delivery/deadletter).
    pub queues: QueueSet,
    /// Chat-platform client for placeholder posts and progress updates.
    pub chat_client: Arc<dyn ChatClient>,
    /// Redelivery dedup store for chat events.
    pub idempotency: IdempotencyStore,
    /// HMAC signing secret shared with the chat platform.
    pub signing_secret: Vec<u8>,
}

/// Build the ingress router (spec §6 "External interfaces"): `POST
/// /chat/events` for the chat platform's webhook, `POST /webhook/query`
/// for upstream business systems.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat/events", post(chat::handle_chat_event))
        .route("/webhook/query", post(webhook::handle_webhook_query))
        .with_state(state)
}
