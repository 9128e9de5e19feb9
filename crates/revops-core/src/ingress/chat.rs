//! Chat ingress entry point (spec §4.2 `on_chat_event`, §6 "Chat
//! ingress").
//!
//! The chat platform itself is an out-of-scope external collaborator
//! (spec §1); [`ChatClient`] is the port through which this component
//! posts the "processing…" placeholder. The concrete implementation
//! (`revops-gateway`) is a thin `reqwest`-based client, since the teacher
//! already depends on `reqwest` everywhere.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::temporal_context;
use crate::model::{WorkItem, WorkItemKind, WorkItemOrigin};

/// Chat updates must complete within this deadline (spec §5).
pub const CHAT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised by a [`ChatClient`] implementation.
#[derive(Debug, Error)]
pub enum ChatClientError {
    /// The call did not complete within [`CHAT_CALL_TIMEOUT`].
    #[error("chat platform call timed out")]
    Timeout,
    /// The chat platform rejected the request.
    #[error("chat platform call failed: {0}")]
    Failed(String),
}

/// The port through which C2/C3 post and update chat messages.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Post a new message (the "processing…" placeholder), returning its
    /// platform-assigned message id.
    ///
    /// # Errors
    /// Returns [`ChatClientError`] on timeout or platform rejection.
    async fn post_message(
        &self,
        channel_id: &str,
        thread_id: &str,
        text: &str,
    ) -> Result<String, ChatClientError>;

    /// Update a previously-posted message in place.
    ///
    /// # Errors
    /// Returns [`ChatClientError`] on timeout or platform rejection.
    async fn update_message(
        &self,
        channel_id: &str,
        message_id: &str,
        text: &str,
    ) -> Result<(), ChatClientError>;
}

const PLACEHOLDER_TEXT: &str = "processing…";

/// The inner `event` object of an `event_callback` envelope (spec §6).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatInnerEvent {
    /// The platform event type; only `app_mention` is handled.
    #[serde(rename = "type")]
    pub event_type: String,
    /// The mentioning user's id.
    pub user: String,
    /// The channel the mention occurred in.
    pub channel: String,
    /// The raw message text, including the bot-mention prefix.
    pub text: String,
    /// This message's own timestamp id.
    pub ts: String,
    /// The thread this message belongs to, if any.
    pub thread_ts: Option<String>,
}

/// A chat-platform webhook envelope (spec §6).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatEnvelope {
    /// `url_verification` (handshake) or `event_callback`.
    #[serde(rename = "type")]
    pub envelope_type: String,
    /// Present only for `url_verification` handshakes.
    pub challenge: Option<String>,
    /// Present only for `event_callback` envelopes.
    pub event: Option<ChatInnerEvent>,
    /// The platform's own id for this event, used for idempotency.
    pub event_id: Option<String>,
}

/// The outcome of handling one [`ChatEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAck {
    /// A `url_verification` handshake; echo `challenge` verbatim.
    Challenge(String),
    /// The event was enqueued as a new `WorkItem`.
    Enqueued,
    /// A redelivery of an already-seen event id; dropped, still acked.
    Duplicate,
    /// Not an `app_mention` event_callback; nothing to do.
    Ignored,
    /// The queue refused the enqueue; still acked (spec §4.2
    /// "Back-pressure": "the chat variant returns success ... and emits
    /// an operational alert").
    BackpressureAcked,
}

/// Error handling a [`ChatEnvelope`] that must NOT be acked as success.
#[derive(Debug, Error)]
pub enum ChatIngressError {
    /// Signature verification failed.
    #[error("signature verification failed")]
    Unauthorized,
    /// Posting the placeholder message failed.
    #[error(transparent)]
    ChatClient(#[from] ChatClientError),
    /// The event carried no usable content to build a `WorkItem` from.
    #[error("empty query after stripping bot mention")]
    EmptyQuery,
}

/// Strip a leading `<@BOTID>` mention prefix and normalize whitespace
/// (spec §4.6 "User-query extraction": "the original mention text with
/// the bot-mention prefix stripped and whitespace normalized").
#[must_use]
pub fn strip_mention_prefix(text: &str) -> String {
    let trimmed = text.trim_start();
    let stripped = if let Some(rest) = trimmed.strip_prefix('<') {
        rest.find('>').map_or(trimmed, |end| &rest[end + 1..])
    } else {
        trimmed
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Handle one already signature-verified [`ChatEnvelope`] (spec §4.2
/// `on_chat_event`). Verification happens by the caller via
/// [`crate::verifier::verify`] before this is invoked, since verification
/// needs the raw, unparsed body bytes and this takes the already-parsed
/// envelope.
///
/// Thread placement (Testable Property 6): `origin.thread_id` is
/// `thread_ts` if present, else the event's own `ts` — so a mention
/// without `thread_ts` starts a new thread rooted at itself.
///
/// # Errors
/// Returns [`ChatIngressError`] if posting the placeholder message fails,
/// or if the stripped query is empty.
pub async fn on_chat_event(
    envelope: &ChatEnvelope,
    chat_client: &dyn ChatClient,
    now: DateTime<Utc>,
) -> Result<(ChatAck, Option<WorkItem>), ChatIngressError> {
    if envelope.envelope_type == "url_verification" {
        return Ok((
            ChatAck::Challenge(envelope.challenge.clone().unwrap_or_default()),
            None,
        ));
    }

    let Some(event) = &envelope.event else {
        return Ok((ChatAck::Ignored, None));
    };
    if envelope.envelope_type != "event_callback" || event.event_type != "app_mention" {
        return Ok((ChatAck::Ignored, None));
    }

    let query = strip_mention_prefix(&event.text);
    if query.is_empty() {
        return Err(ChatIngressError::EmptyQuery);
    }

    let thread_id = event.thread_ts.clone().unwrap_or_else(|| event.ts.clone());
    let placeholder_message_id = chat_client
        .post_message(&event.channel, &thread_id, PLACEHOLDER_TEXT)
        .await?;

    let origin = WorkItemOrigin::Chat {
        channel_id: event.channel.clone(),
        user_id: event.user.clone(),
        thread_id,
        placeholder_message_id,
    };

    let work_item = WorkItem::new(
        WorkItemKind::ChatMention,
        origin,
        query,
        temporal_context(now),
        now,
    )
    .map_err(|_| ChatIngressError::EmptyQuery)?;

    Ok((ChatAck::Enqueued, Some(work_item)))
}
