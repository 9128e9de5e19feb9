//! `POST /chat/events` handler (C1 verify + C2 `on_chat_event`).

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use revops_core::ingress::{ChatAck, ChatEnvelope, on_chat_event};
use revops_core::queue::Queue;
use revops_core::verifier;

use super::AppState;

const TIMESTAMP_HEADER: &str = "x-revops-request-timestamp";
const SIGNATURE_HEADER: &str = "x-revops-signature";

/// Verify the HMAC envelope, then hand the parsed body to
/// [`on_chat_event`], enqueuing the resulting `WorkItem` if any.
pub async fn handle_chat_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let now = chrono::Utc::now();

    let timestamp = headers.get(TIMESTAMP_HEADER).and_then(|v| v.to_str().ok());
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    if let Err(error) = verifier::verify(&state.signing_secret, timestamp, signature, &body, now) {
        tracing::warn!(error = %error, "chat ingress rejected an unverifiable request");
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }

    let envelope: ChatEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(error) => {
            tracing::warn!(error = %error, "chat ingress received a malformed envelope");
            return (StatusCode::BAD_REQUEST, "malformed envelope").into_response();
        }
    };

    if let Some(event_id) = &envelope.event_id
        && !state.idempotency.observe(event_id, now)
    {
        return (StatusCode::OK, "duplicate").into_response();
    }

    match on_chat_event(&envelope, state.chat_client.as_ref(), now).await {
        Ok((ChatAck::Challenge(challenge), _)) => (StatusCode::OK, challenge).into_response(),
        Ok((ChatAck::Enqueued, Some(work_item))) => {
            let body = match serde_json::to_string(&work_item) {
                Ok(body) => body,
                Err(error) => {
                    tracing::error!(error = %error, "failed to serialize chat work item");
                    return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
                }
            };
            if let Err(error) = state.queues.primary.enqueue(body, None).await {
                tracing::error!(error = %error, "primary queue refused chat work item enqueue");
                return (StatusCode::OK, "accepted (queue backpressure)").into_response();
            }
            (StatusCode::OK, "enqueued").into_response()
        }
        Ok((ChatAck::Enqueued, None)) => {
            tracing::error!("on_chat_event reported Enqueued without a WorkItem");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
        Ok((ChatAck::Duplicate | ChatAck::Ignored | ChatAck::BackpressureAcked, _)) => {
            (StatusCode::OK, "acknowledged").into_response()
        }
        Err(error) => {
            tracing::warn!(error = %error, "chat ingress failed to process event");
            (StatusCode::OK, "acknowledged").into_response()
        }
    }
}
