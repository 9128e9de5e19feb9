//! `ConversationRecord` (spec §3, §4.6): the canonical artifact assembled
//! by C6 from a session's trace stream.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recorder::parser::ReasoningBreakdown;

/// A single tool execution, normalized from possibly-separated
/// invoke/output trace events (spec §4.6 "Tool-execution normalization").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
    /// The tool's name.
    pub tool_name: String,
    /// A summary of the parameters passed.
    pub parameters_summary: String,
    /// A summary of the result.
    pub result_summary: String,
    /// Whether the call succeeded.
    pub success: bool,
    /// Wall-clock duration between invoke and output events, if both were
    /// observed.
    pub execution_time_ms: Option<i64>,
}

/// A data-access operation observed within a step (queries, lookups).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataOperation {
    /// The kind of operation (`knowledge_lookup`, `sql_query`, ...).
    pub operation_type: String,
    /// A short description of what was accessed.
    pub target: String,
}

/// One agent's contribution to the conversation (spec §3
/// `ConversationRecord::agent_flow`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    /// The acting agent's name or id. `None` when attribution failed
    /// entirely (spec §4.6 "Agent attribution").
    pub agent_name: Option<String>,
    /// Confidence in `agent_name`'s correctness, in `[0.0, 1.0]`.
    pub attribution_confidence: f64,
    /// When this step began.
    pub started_at: DateTime<Utc>,
    /// When this step ended.
    pub ended_at: DateTime<Utc>,
    /// The structured breakdown of this step's reasoning text.
    pub reasoning_breakdown: ReasoningBreakdown,
    /// Tools invoked during this step.
    pub tools_used: Vec<ToolExecution>,
    /// Data operations performed during this step.
    pub data_operations: Vec<DataOperation>,
    /// Collaborators this step invoked.
    pub collaboration_sent: Vec<String>,
    /// Collaborators whose output this step received.
    pub collaboration_received: Vec<String>,
}

impl AgentStep {
    /// Step duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}

/// One edge in the `collaboration_map` agent→agent graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollaborationEdge {
    /// The invoking agent.
    pub from_agent: String,
    /// The invoked agent.
    pub to_agent: String,
}

/// Aggregate counters over the whole record (spec §3
/// `ConversationRecord::function_audit`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FunctionAudit {
    /// Total tool executions across all steps.
    pub tool_executions: u32,
    /// Total tool executions whose outcome was an error.
    pub tool_errors: u32,
    /// Total data operations across all steps.
    pub data_operations: u32,
}

/// Simple per-record quality signals (spec §4.6 "Quality analysis"). Not
/// alerting-relevant; downstream analysis only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QualitySignals {
    /// Total reasoning-text length summed across steps.
    pub total_reasoning_chars: usize,
    /// Count of tool invocations with error outcomes.
    pub tool_error_count: u32,
    /// Count of knowledge-base hits across the record.
    pub knowledge_base_hit_count: u32,
    /// Total wall-clock duration of the session.
    pub total_duration_ms: i64,
}

/// The canonical artifact assembled by C6 from a session's trace stream
/// (spec §3, §4.6).
///
/// Invariants: `system_prompt_fingerprints` is append-only within a
/// record; every step's referenced fingerprint resolves to exactly one
/// body (enforced by [`ConversationRecord::intern_prompt`]); trace-event
/// ordering is monotonic (a property of how C3/C6 append, not of this
/// type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// The conversation this record belongs to.
    pub conversation_id: String,
    /// The agent session id that produced this record.
    pub session_id: String,
    /// Origin channel description (e.g. Slack channel id, or
    /// `source_system:source_process` for webhooks).
    pub channel: String,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// When the session ended.
    pub ended_at: DateTime<Utc>,
    /// The user-visible query that started this session.
    pub user_query: String,
    /// The final assembled response.
    pub final_response: String,
    /// Whether the session completed successfully.
    pub success: bool,
    /// Details of the terminal failure, if any.
    pub error_details: Option<String>,
    /// The ordered per-agent steps.
    pub agent_flow: Vec<AgentStep>,
    /// The agent→agent collaboration graph.
    pub collaboration_map: Vec<CollaborationEdge>,
    /// Aggregate counters.
    pub function_audit: FunctionAudit,
    /// Quality signals for downstream analysis.
    pub quality_signals: QualitySignals,
    /// `{fingerprint → prompt body}`, append-only.
    pub system_prompt_fingerprints: HashMap<String, String>,
}

impl ConversationRecord {
    /// Start a new, empty record for a session.
    #[must_use]
    pub fn new(
        conversation_id: impl Into<String>,
        session_id: impl Into<String>,
        channel: impl Into<String>,
        user_query: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            session_id: session_id.into(),
            channel: channel.into(),
            started_at,
            ended_at: started_at,
            user_query: user_query.into(),
            final_response: String::new(),
            success: false,
            error_details: None,
            agent_flow: Vec::new(),
            collaboration_map: Vec::new(),
            function_audit: FunctionAudit::default(),
            quality_signals: QualitySignals::default(),
            system_prompt_fingerprints: HashMap::new(),
        }
    }

    /// Intern a system prompt body under its fingerprint, returning the
    /// fingerprint. If the fingerprint is already present the existing
    /// entry is left untouched (append-only; Testable Property 2:
    /// fingerprint uniqueness).
    pub fn intern_prompt(&mut self, fingerprint: String, body: String) -> String {
        self.system_prompt_fingerprints
            .entry(fingerprint.clone())
            .or_insert(body);
        fingerprint
    }

    /// Append a completed step, folding its tool executions and data
    /// operations into `function_audit` and `quality_signals`, and its
    /// collaboration edges into `collaboration_map`.
    pub fn push_step(&mut self, step: AgentStep) {
        self.function_audit.tool_executions += step.tools_used.len() as u32;
        self.function_audit.tool_errors +=
            step.tools_used.iter().filter(|t| !t.success).count() as u32;
        self.function_audit.data_operations += step.data_operations.len() as u32;

        self.quality_signals.total_reasoning_chars += step.reasoning_breakdown.text_len();
        self.quality_signals.tool_error_count +=
            step.tools_used.iter().filter(|t| !t.success).count() as u32;
        self.quality_signals.knowledge_base_hit_count +=
            step.reasoning_breakdown.knowledge_base_searches.len() as u32;

        if let Some(name) = &step.agent_name {
            for collaborator in &step.collaboration_sent {
                self.collaboration_map.push(CollaborationEdge {
                    from_agent: name.clone(),
                    to_agent: collaborator.clone(),
                });
            }
        }

        self.agent_flow.push(step);
    }

    /// Finalize the record at session end.
    pub fn finish(
        &mut self,
        ended_at: DateTime<Utc>,
        final_response: impl Into<String>,
        success: bool,
        error_details: Option<String>,
    ) {
        self.ended_at = ended_at;
        self.final_response = final_response.into();
        self.success = success;
        self.error_details = error_details;
        self.quality_signals.total_duration_ms = (self.ended_at - self.started_at).num_milliseconds();
    }

    /// Distinct agent names that contributed to this record, supplemented
    /// from `original_source`'s `webhook_conversation_tracker.py` /
    /// `conversation_exporter.py` (a flattened dedup of
    /// `agent_flow[].agent_name`). Recomputed, never separately mutable,
    /// so it cannot drift from `agent_flow`.
    #[must_use]
    pub fn agents_involved(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for step in &self.agent_flow {
            if let Some(name) = &step.agent_name {
                if !seen.contains(name) {
                    seen.push(name.clone());
                }
            }
        }
        seen
    }

    /// Whether this record has any recorded failure, derived from
    /// `error_details` (feeds the `metadata.json` export's `has_errors`
    /// flag).
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_details.is_some() || !self.success
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
    fn intern_prompt_is_append_only() {
        let mut record = ConversationRecord::new("c1", "s1", "C1", "q", now());
        let fp = record.intern_prompt("fp1".into(), "prompt body".into());
        record.intern_prompt(fp.clone(), "different body ignored".into());
        assert_eq!(
            record.system_prompt_fingerprints.get(&fp).unwrap(),
            "prompt body"
        );
    }

    #[test]
    fn agents_involved_dedups_preserving_first_seen_order() {
        let mut record = ConversationRecord::new("c1", "s1", "C1", "q", now());
        for name in ["Router", "DataAgent", "Router"] {
            record.push_step(AgentStep {
                agent_name: Some(name.to_string()),
                attribution_confidence: 1.0,
                started_at: now(),
                ended_at: now(),
                reasoning_breakdown: ReasoningBreakdown::fallback("x", None),
                tools_used: Vec::new(),
                data_operations: Vec::new(),
                collaboration_sent: Vec::new(),
                collaboration_received: Vec::new(),
            });
        }
        assert_eq!(
            record.agents_involved(),
            vec!["Router".to_string(), "DataAgent".to_string()]
        );
    }

    #[test]
    fn has_errors_reflects_error_details_or_failure() {
        let mut record = ConversationRecord::new("c1", "s1", "C1", "q", now());
        record.finish(now(), "done", true, None);
        assert!(!record.has_errors());
        record.finish(now(), "done", false, None);
        assert!(record.has_errors());
    }
}
