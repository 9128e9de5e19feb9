//! Webhook ingress entry point (spec §4.2 `on_webhook_request`, §6
//! "Webhook ingress").
//!
//! Supplemented from `enhanced_webhook_handler.py`: `source_system` and
//! `source_process` are normalized to lowercase, trimmed strings before
//! becoming part of the `WorkItem`'s identity — present in the original
//! handler, dropped from spec.md's prose but not contradicted by it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::temporal_context;
use crate::model::{WorkItem, WorkItemError, WorkItemKind, WorkItemOrigin};

/// The expected estimated turnaround communicated back to the caller
/// (spec §6 webhook response `estimated_delivery_time`); a conservative
/// upper bound on agent invocation latency (spec §5: agent read up to
/// 240 seconds) plus classification and delivery overhead.
pub const ESTIMATED_DELIVERY_SECONDS: i64 = 300;

/// The raw webhook request body (spec §6).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookRequest {
    /// The user-visible query.
    pub query: String,
    /// The upstream system name.
    pub source_system: String,
    /// The upstream process name.
    pub source_process: String,
    /// ISO-8601 timestamp of when the upstream event occurred.
    pub timestamp: String,
}

/// The fields returned on successful enqueue (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    /// The minted correlation id, returned to the caller as
    /// `tracking_id`.
    pub tracking_id: Uuid,
    /// When the request was received.
    pub queued_at: DateTime<Utc>,
    /// A conservative estimate of when delivery will complete.
    pub estimated_delivery: DateTime<Utc>,
}

/// Validation/backpressure failures for `on_webhook_request` (spec §4.2,
/// §7 `malformed_input`).
#[derive(Debug, Error)]
pub enum WebhookIngressError {
    /// A required field was missing or empty.
    #[error("missing or empty required field: {0}")]
    MissingField(&'static str),
    /// `timestamp` was not valid ISO-8601.
    #[error("timestamp is not a valid ISO-8601 instant")]
    InvalidTimestamp,
    /// The queue refused the enqueue (spec §4.2: "the webhook variant
    /// returns `service_unavailable` so the upstream may retry").
    #[error("queue unavailable")]
    ServiceUnavailable,
}

/// Validate and normalize a [`WebhookRequest`] into a `(WorkItem, tracking
/// ack)` pair, per spec §4.2 `on_webhook_request`.
///
/// # Errors
/// Returns [`WebhookIngressError`] if required fields are missing/empty
/// or `timestamp` does not parse as ISO-8601.
pub fn build_work_item(
    request: &WebhookRequest,
    now: DateTime<Utc>,
) -> Result<(WorkItem, WebhookAck), WebhookIngressError> {
    if request.query.trim().is_empty() {
        return Err(WebhookIngressError::MissingField("query"));
    }
    let source_system = normalize_field(&request.source_system)
        .ok_or(WebhookIngressError::MissingField("source_system"))?;
    let source_process = normalize_field(&request.source_process)
        .ok_or(WebhookIngressError::MissingField("source_process"))?;

    DateTime::parse_from_rfc3339(&request.timestamp)
        .map_err(|_| WebhookIngressError::InvalidTimestamp)?;

    let target_correlation_id = Uuid::new_v4().to_string();
    let origin = WorkItemOrigin::Webhook {
        source_system,
        source_process,
        target_correlation_id: target_correlation_id.clone(),
    };

    let work_item = WorkItem::new(
        WorkItemKind::WebhookQuery,
        origin,
        request.query.clone(),
        temporal_context(now),
        now,
    )
    .map_err(|WorkItemError::EmptyQuery| WebhookIngressError::MissingField("query"))?;

    let ack = WebhookAck {
        tracking_id: Uuid::parse_str(&target_correlation_id)
            .expect("target_correlation_id was just minted as a UUID string"),
        queued_at: now,
        estimated_delivery: now + chrono::Duration::seconds(ESTIMATED_DELIVERY_SECONDS),
    };

    Ok((work_item, ack))
}

fn normalize_field(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap()
    }

    fn request() -> WebhookRequest {
        WebhookRequest {
            query: "What is the status of the IXIS deal?".into(),
            source_system: "  CRM  ".into(),
            source_process: "Auto".into(),
            timestamp: "2025-01-01T10:00:00Z".into(),
        }
    }

    #[test]
    fn normalizes_source_fields_to_lowercase_trimmed() {
        let (work_item, _) = build_work_item(&request(), now()).unwrap();
        let WorkItemOrigin::Webhook {
            source_system,
            source_process,
            ..
        } = work_item.origin
        else {
            panic!("expected webhook origin");
        };
        assert_eq!(source_system, "crm");
        assert_eq!(source_process, "auto");
    }

    #[test]
    fn rejects_empty_query() {
        let mut req = request();
        req.query = "   ".into();
        let err = build_work_item(&req, now()).unwrap_err();
        assert!(matches!(err, WebhookIngressError::MissingField("query")));
    }

    #[test]
    fn rejects_invalid_timestamp() {
        let mut req = request();
        req.timestamp = "not-a-date".into();
        let err = build_work_item(&req, now()).unwrap_err();
        assert!(matches!(err, WebhookIngressError::InvalidTimestamp));
    }

    #[test]
    fn ack_carries_tracking_id_matching_work_item_origin() {
        let (work_item, ack) = build_work_item(&request(), now()).unwrap();
        assert_eq!(work_item.origin.conversation_id(), ack.tracking_id.to_string());
    }
}
