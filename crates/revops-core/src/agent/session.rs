//! `AgentSession` (spec §3, owned by C3).

use chrono::{DateTime, Utc};

use crate::model::{TraceEvent, WorkItemOrigin};

/// `idle → streaming → {completed | failed} → exported` (spec §4.3
/// "State machine").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, not yet invoking the agent runtime.
    Idle,
    /// A streamed invocation is in progress.
    Streaming,
    /// The stream ended successfully.
    Completed,
    /// The stream ended in failure, or the end-to-end budget was
    /// exceeded (spec §5 "Cancellation").
    Failed,
    /// C6 has exported the resulting `ConversationRecord`.
    Exported,
}

/// Derive the stable session identifier (spec §3 `AgentSession::session_key`).
///
/// Chat: thread-scoped (`{user-id}:{channel-id}:{thread-id}`) so follow-on
/// messages in the same thread continue the same context; falls back to
/// channel scope if no thread id is present (ingress normally always
/// assigns one). Webhook: per-invocation, scoped by the epoch second the
/// session started so repeated identical queries don't collide.
#[must_use]
pub fn derive_session_key(origin: &WorkItemOrigin, started_at: DateTime<Utc>) -> String {
    match origin {
        WorkItemOrigin::Chat {
            user_id,
            channel_id,
            thread_id,
            ..
        } => {
            if thread_id.is_empty() {
                format!("{user_id}:{channel_id}")
            } else {
                format!("{user_id}:{channel_id}:{thread_id}")
            }
        }
        WorkItemOrigin::Webhook { .. } => {
            format!("{}:{}", origin.conversation_id(), started_at.timestamp())
        }
    }
}

/// Per-invocation session state owned exclusively by C3 for its lifetime
/// (spec §3).
#[derive(Debug, Clone)]
pub struct AgentSession {
    /// The stable session identifier (see [`derive_session_key`]).
    pub session_key: String,
    /// When the session began streaming.
    pub started_at: DateTime<Utc>,
    /// When the session ended, once known.
    pub ended_at: Option<DateTime<Utc>>,
    /// The concatenation of all response chunks observed so far.
    pub assembled_response: String,
    /// The ordered sequence of trace events observed so far.
    pub trace_events: Vec<TraceEvent>,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Whether the session ended successfully, once terminal.
    pub success: bool,
}

impl AgentSession {
    /// Start a new, idle session.
    #[must_use]
    pub fn new(session_key: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            session_key: session_key.into(),
            started_at,
            ended_at: None,
            assembled_response: String::new(),
            trace_events: Vec::new(),
            state: SessionState::Idle,
            success: false,
        }
    }

    /// Transition to `Streaming` once the agent invocation opens.
    pub fn begin_streaming(&mut self) {
        self.state = SessionState::Streaming;
    }

    /// Append a response-text chunk to the assembled buffer.
    pub fn append_chunk(&mut self, text: &str) {
        self.assembled_response.push_str(text);
    }

    /// Append a normalized trace event, preserving emission order
    /// (Testable Property 3).
    pub fn append_trace(&mut self, event: TraceEvent) {
        self.trace_events.push(event);
    }

    /// Finalize the session.
    pub fn finish(&mut self, ended_at: DateTime<Utc>, success: bool) {
        self.ended_at = Some(ended_at);
        self.success = success;
        self.state = if success {
            SessionState::Completed
        } else {
            SessionState::Failed
        };
    }

    /// Mark the session's record as exported by C6.
    pub fn mark_exported(&mut self) {
        self.state = SessionState::Exported;
    }

    /// Session duration in milliseconds, once ended.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|ended_at| (ended_at - self.started_at).num_milliseconds())
    }
}
