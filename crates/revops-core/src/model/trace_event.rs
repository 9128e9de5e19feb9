//! `TraceEvent` (spec §3, §4.3): the normalized unit streamed from the
//! agent runtime, forwarded to C6.
//!
//! `TracePayload` is a tagged enum rather than a dynamic dict/JSON blob,
//! per spec §9's REDESIGN FLAGS ("push event-shape knowledge into a single
//! normalizer"), following the teacher's `StreamEvent`
//! (`machi/src/agent/events.rs`) and `MemoryStep`
//! (`machi/src/agent/memory.rs`) tagged-enum conventions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The enumerated lifecycle sub-kind carried by
/// [`TracePayload::Lifecycle`].
///
/// `GuardrailIntervention` is supplemented from `original_source`
/// (`revops_manager_agent_wrapper.py`, `agent_tracer.py`): some agent
/// versions emit a `guardrail` event mid-stream when content is filtered.
/// spec.md's enumerated event types don't name it, but nothing in its
/// Non-goals excludes observing it, so it is folded in here rather than
/// silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    /// The agent runtime signaled `return_control`; logged, does not
    /// affect the assembled response.
    ReturnControl,
    /// Content was filtered or blocked mid-stream by a guardrail.
    GuardrailIntervention,
}

/// Discriminant mirroring [`TracePayload`]'s variants, without the
/// payload data. Used where only the event category matters (progress
/// mapping priority, quick pattern matching in tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventKind {
    /// A response-text chunk.
    Chunk,
    /// The agent's own reasoning text.
    Rationale,
    /// A sub-agent (collaborator) was invoked.
    CollaboratorInvoke,
    /// A collaborator returned output.
    CollaboratorOutput,
    /// A tool was invoked.
    ToolInvoke,
    /// A tool returned output.
    ToolOutput,
    /// A knowledge-base lookup occurred.
    KnowledgeLookup,
    /// Raw model input was logged.
    ModelInput,
    /// Raw model output was logged.
    ModelOutput,
    /// An error occurred mid-stream.
    Error,
    /// A lifecycle signal (`return_control`, guardrail intervention, ...).
    Lifecycle,
}

/// The type-dependent payload of a [`TraceEvent`] (spec §3
/// `TraceEvent::payload`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TracePayload {
    /// A response-text chunk, appended to the assembled response buffer.
    Chunk {
        /// The chunk's text content.
        text: String,
    },
    /// The agent's own reasoning text ("Thinking: ...").
    Rationale {
        /// The reasoning text.
        text: String,
    },
    /// A sub-agent was invoked.
    CollaboratorInvoke {
        /// The collaborator's name.
        name: String,
        /// Summary of the input handed to the collaborator, if captured.
        input_summary: Option<String>,
    },
    /// A collaborator returned output.
    CollaboratorOutput {
        /// The collaborator's name.
        name: String,
        /// Summary of the collaborator's output, if captured.
        output_summary: Option<String>,
    },
    /// A tool was invoked.
    ToolInvoke {
        /// The tool's name.
        name: String,
        /// A digest of the parameters passed (not the raw payload, which
        /// may be large or sensitive).
        parameters_digest: String,
    },
    /// A tool returned output.
    ToolOutput {
        /// The tool's name.
        name: String,
        /// Whether the tool call succeeded.
        success: bool,
        /// A short summary of the result (row count, success message,
        /// error text).
        result_summary: String,
    },
    /// A knowledge-base search occurred.
    KnowledgeLookup {
        /// The search query text.
        query: String,
        /// The knowledge-base identifier searched.
        knowledge_base_id: String,
    },
    /// Raw input handed to the underlying model.
    ModelInput {
        /// A summary of the input.
        summary: String,
    },
    /// Raw output returned by the underlying model.
    ModelOutput {
        /// A summary of the output.
        summary: String,
    },
    /// An error occurred mid-stream.
    Error {
        /// The error message.
        message: String,
    },
    /// A lifecycle signal.
    Lifecycle {
        /// Which lifecycle signal this is.
        kind: LifecycleKind,
    },
}

impl TracePayload {
    /// The discriminant for this payload, for priority-mapping and
    /// pattern-matching without destructuring the full payload.
    #[must_use]
    pub const fn kind(&self) -> TraceEventKind {
        match self {
            Self::Chunk { .. } => TraceEventKind::Chunk,
            Self::Rationale { .. } => TraceEventKind::Rationale,
            Self::CollaboratorInvoke { .. } => TraceEventKind::CollaboratorInvoke,
            Self::CollaboratorOutput { .. } => TraceEventKind::CollaboratorOutput,
            Self::ToolInvoke { .. } => TraceEventKind::ToolInvoke,
            Self::ToolOutput { .. } => TraceEventKind::ToolOutput,
            Self::KnowledgeLookup { .. } => TraceEventKind::KnowledgeLookup,
            Self::ModelInput { .. } => TraceEventKind::ModelInput,
            Self::ModelOutput { .. } => TraceEventKind::ModelOutput,
            Self::Error { .. } => TraceEventKind::Error,
            Self::Lifecycle { .. } => TraceEventKind::Lifecycle,
        }
    }
}

/// A single normalized event in a session's trace stream (spec §3).
///
/// Invariant (spec Testable Property 3): the order events are appended to
/// a `ConversationRecord`'s trace log equals the order of emission from
/// the agent stream. Nothing in this type enforces that — it is a
/// property of how C3/C6 append, not of the type itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// The event's payload.
    pub payload: TracePayload,
    /// When C3 observed this event.
    pub timestamp: DateTime<Utc>,
}

impl TraceEvent {
    /// Construct a trace event at the given instant.
    #[must_use]
    pub const fn new(payload: TracePayload, timestamp: DateTime<Utc>) -> Self {
        Self { payload, timestamp }
    }

    /// The event's discriminant kind.
    #[must_use]
    pub const fn kind(&self) -> TraceEventKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn kind_matches_payload_variant() {
        let event = TraceEvent::new(
            TracePayload::Rationale {
                text: "thinking".into(),
            },
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        );
        assert_eq!(event.kind(), TraceEventKind::Rationale);
    }

    #[test]
    fn tagged_enum_round_trips_through_json() {
        let payload = TracePayload::ToolInvoke {
            name: "sql_query".into(),
            parameters_digest: "abc123".into(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"type\":\"tool_invoke\""));
        let back: TracePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), TraceEventKind::ToolInvoke);
    }
}
