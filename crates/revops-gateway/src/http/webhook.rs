//! `POST /webhook/query` handler (C2 `on_webhook_request`).

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use revops_core::ingress::{WebhookAck, WebhookIngressError, WebhookRequest, build_work_item};
use revops_core::queue::Queue;

use super::AppState;

/// Validate and enqueue a webhook query, returning a tracking ack (spec
/// §6 webhook response).
pub async fn handle_webhook_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WebhookRequest>,
) -> impl IntoResponse {
    let now = chrono::Utc::now();

    let (work_item, ack) = match build_work_item(&request, now) {
        Ok(pair) => pair,
        Err(WebhookIngressError::MissingField(field)) => {
            return (StatusCode::BAD_REQUEST, format!("missing or empty required field: {field}"))
                .into_response();
        }
        Err(WebhookIngressError::InvalidTimestamp) => {
            return (StatusCode::BAD_REQUEST, "timestamp is not a valid ISO-8601 instant".to_owned())
                .into_response();
        }
        Err(WebhookIngressError::ServiceUnavailable) => unreachable!(
            "build_work_item never returns ServiceUnavailable; it is raised by the caller on enqueue failure"
        ),
    };

    let body = match serde_json::to_string(&work_item) {
        Ok(body) => body,
        Err(error) => {
            tracing::error!(error = %error, "failed to serialize webhook work item");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned()).into_response();
        }
    };

    if let Err(error) = state.queues.primary.enqueue(body, None).await {
        tracing::error!(error = %error, "primary queue refused webhook work item enqueue");
        return (StatusCode::SERVICE_UNAVAILABLE, "queue unavailable, please retry".to_owned())
            .into_response();
    }

    (StatusCode::ACCEPTED, Json(WebhookAckBody::from(ack))).into_response()
}

#[derive(Debug, serde::Serialize)]
struct WebhookAckBody {
    tracking_id: uuid::Uuid,
    queued_at: chrono::DateTime<chrono::Utc>,
    estimated_delivery_time: chrono::DateTime<chrono::Utc>,
}

impl From<WebhookAck> for WebhookAckBody {
    fn from(ack: WebhookAck) -> Self {
        Self {
            tracking_id: ack.tracking_id,
            queued_at: ack.queued_at,
            estimated_delivery_time: ack.estimated_delivery,
        }
    }
}
