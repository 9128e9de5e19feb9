//! `WorkItem` (spec §3): the unit of async work created by C2 and consumed
//! by C3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The origin event kind that produced a [`WorkItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemKind {
    /// A chat-platform `app_mention` event.
    ChatMention,
    /// A business-system webhook request.
    WebhookQuery,
}

/// Where a [`WorkItem`]'s reply must be addressed.
///
/// Chat origin fields address a channel/thread; webhook origin fields
/// address a correlation id carried through to the eventual delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItemOrigin {
    /// Chat-platform origin.
    Chat {
        /// The channel the mention occurred in.
        channel_id: String,
        /// The user who mentioned the bot.
        user_id: String,
        /// The thread timestamp all replies must land in.
        thread_id: String,
        /// The id of the "processing…" placeholder message to update.
        placeholder_message_id: String,
    },
    /// Business-system webhook origin.
    Webhook {
        /// Name of the upstream system that sent the webhook.
        source_system: String,
        /// Name of the process within that system.
        source_process: String,
        /// Correlation id minted at ingress, returned to the caller as
        /// `tracking_id` and threaded through to the delivery payload.
        target_correlation_id: String,
    },
}

impl WorkItemOrigin {
    /// The stable per-conversation identifier used downstream (session
    /// keying, delivery payload `tracking_id`, object-store paths).
    #[must_use]
    pub fn conversation_id(&self) -> String {
        match self {
            Self::Chat {
                channel_id,
                thread_id,
                ..
            } => format!("{channel_id}:{thread_id}"),
            Self::Webhook {
                target_correlation_id,
                ..
            } => target_correlation_id.clone(),
        }
    }
}

/// A unit of async work flowing from ingress (C2) to the agent invoker
/// (C3) over the durable queue.
///
/// Invariants (spec §3): `query` is never mutated after enqueue; `origin`
/// carries everything needed to address the reply sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// The origin event kind.
    pub kind: WorkItemKind,
    /// Where the eventual reply must be addressed.
    pub origin: WorkItemOrigin,
    /// The user-visible input text. Required, non-empty after trim.
    pub query: String,
    /// Standardized preamble describing current date/quarter/month,
    /// injected ahead of `query` in the agent prompt.
    pub temporal_context: String,
    /// Monotonic timestamp assigned at ingress.
    pub received_at: DateTime<Utc>,
}

/// Error constructing a [`WorkItem`] from raw ingress fields.
#[derive(Debug, thiserror::Error)]
pub enum WorkItemError {
    /// `query` was empty (or all whitespace) after trimming.
    #[error("query must be non-empty after trimming whitespace")]
    EmptyQuery,
}

impl WorkItem {
    /// Construct a new work item, trimming and validating `query`.
    ///
    /// # Errors
    /// Returns [`WorkItemError::EmptyQuery`] if `query` is empty after
    /// trimming.
    pub fn new(
        kind: WorkItemKind,
        origin: WorkItemOrigin,
        query: impl Into<String>,
        temporal_context: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Result<Self, WorkItemError> {
        let query = query.into();
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(WorkItemError::EmptyQuery);
        }
        Ok(Self {
            kind,
            origin,
            query: trimmed.to_owned(),
            temporal_context: temporal_context.into(),
            received_at,
        })
    }

    /// The full prompt sent to the agent: temporal preamble followed by the
    /// user query (spec §4.3).
    #[must_use]
    pub fn prompt(&self) -> String {
        format!("{}\n\n{}", self.temporal_context, self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn rejects_blank_query() {
        let origin = WorkItemOrigin::Webhook {
            source_system: "crm".into(),
            source_process: "auto".into(),
            target_correlation_id: "abc".into(),
        };
        let err = WorkItem::new(WorkItemKind::WebhookQuery, origin, "   ", "ctx", now())
            .unwrap_err();
        assert!(matches!(err, WorkItemError::EmptyQuery));
    }

    #[test]
    fn trims_query() {
        let origin = WorkItemOrigin::Webhook {
            source_system: "crm".into(),
            source_process: "auto".into(),
            target_correlation_id: "abc".into(),
        };
        let item = WorkItem::new(
            WorkItemKind::WebhookQuery,
            origin,
            "  hello  ",
            "ctx",
            now(),
        )
        .unwrap();
        assert_eq!(item.query, "hello");
    }

    #[test]
    fn chat_conversation_id_combines_channel_and_thread() {
        let origin = WorkItemOrigin::Chat {
            channel_id: "C1".into(),
            user_id: "U1".into(),
            thread_id: "T1".into(),
            placeholder_message_id: "M1".into(),
        };
        assert_eq!(origin.conversation_id(), "C1:T1");
    }
}
