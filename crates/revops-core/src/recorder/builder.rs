//! Assembling a [`ConversationRecord`] from a session's trace stream
//! (spec §4.6 "Conversation recording"), owned by C6.
//!
//! Supplemented from `original_source/V5/monitoring/
//! conversation_exporter.py`'s step-partitioning approach: a step begins
//! at each `collaborator_invoke` event (the event that hands control to a
//! new acting agent) and runs up to, but not including, the next one.

use chrono::{DateTime, Utc};

use crate::agent::session::AgentSession;
use crate::model::{
    AgentStep, ConversationRecord, DataOperation, TraceEvent, TraceEventKind, TracePayload,
    WorkItemOrigin,
};
use crate::recorder::attribution;
use crate::recorder::parser::ReasoningTextParser;
use crate::recorder::tool_normalize;

/// Build the final [`ConversationRecord`] for a completed session (spec
/// §4.6). `channel` is the origin channel/process description; `system_prompt`
/// is interned under its content fingerprint if present.
#[must_use]
pub fn build_record(
    session: &AgentSession,
    origin: &WorkItemOrigin,
    user_query: &str,
    system_prompt: Option<(&str, &str)>,
) -> ConversationRecord {
    let conversation_id = origin.conversation_id();
    let channel = match origin {
        WorkItemOrigin::Chat { channel_id, .. } => channel_id.clone(),
        WorkItemOrigin::Webhook {
            source_system,
            source_process,
            ..
        } => format!("{source_system}:{source_process}"),
    };

    let mut record = ConversationRecord::new(
        conversation_id,
        session.session_key.clone(),
        channel,
        user_query,
        session.started_at,
    );

    if let Some((fingerprint, body)) = system_prompt {
        record.intern_prompt(fingerprint.to_owned(), body.to_owned());
    }

    for partition in partition_steps(&session.trace_events) {
        record.push_step(build_step(partition, session.started_at));
    }

    let ended_at = session.ended_at.unwrap_or(session.started_at);
    let error_details = (!session.success).then(|| "agent invocation did not complete successfully".to_owned());
    record.finish(
        ended_at,
        session.assembled_response.clone(),
        session.success,
        error_details,
    );

    record
}

/// Split a flat trace into per-step slices, starting a new step at each
/// `CollaboratorInvoke` event (inclusive). Events before the first
/// `CollaboratorInvoke` form an initial step attributed to whichever
/// signal `attribution::attribute` can find.
fn partition_steps(events: &[TraceEvent]) -> Vec<&[TraceEvent]> {
    if events.is_empty() {
        return Vec::new();
    }

    let mut boundaries = vec![0usize];
    for (index, event) in events.iter().enumerate().skip(1) {
        if event.kind() == TraceEventKind::CollaboratorInvoke {
            boundaries.push(index);
        }
    }
    boundaries.push(events.len());

    boundaries
        .windows(2)
        .map(|window| &events[window[0]..window[1]])
        .collect()
}

fn build_step(events: &[TraceEvent], fallback_started_at: DateTime<Utc>) -> AgentStep {
    let attribution = attribution::attribute(events);

    let reasoning_text: String = events
        .iter()
        .filter_map(|event| match &event.payload {
            TracePayload::Rationale { text } | TracePayload::ModelOutput { summary: text } => {
                Some(text.as_str())
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    let reasoning_breakdown = ReasoningTextParser.parse(&reasoning_text);

    let tools_used = tool_normalize::normalize(events);

    let data_operations = events
        .iter()
        .filter_map(|event| match &event.payload {
            TracePayload::KnowledgeLookup {
                query,
                knowledge_base_id,
            } => Some(DataOperation {
                operation_type: "knowledge_lookup".to_owned(),
                target: format!("{knowledge_base_id}: {query}"),
            }),
            _ => None,
        })
        .collect();

    let collaboration_sent = events
        .iter()
        .filter_map(|event| match &event.payload {
            TracePayload::CollaboratorInvoke { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();
    let collaboration_received = events
        .iter()
        .filter_map(|event| match &event.payload {
            TracePayload::CollaboratorOutput { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();

    let started_at = events.first().map_or(fallback_started_at, |e| e.timestamp);
    let ended_at = events.last().map_or(started_at, |e| e.timestamp);

    AgentStep {
        agent_name: attribution.agent_name,
        attribution_confidence: attribution.confidence,
        started_at,
        ended_at,
        reasoning_breakdown,
        tools_used,
        data_operations,
        collaboration_sent,
        collaboration_received,
    }
}
