//! Analysis-pattern derivation for `analysis.json` (spec §4.6 "Export",
//! supplemented from `original_source/V5/monitoring/
//! conversation_exporter.py`'s `_analyze_routing_pattern` and
//! `_analyze_data_access`). Bucket boundaries are preserved exactly.

use serde::{Deserialize, Serialize};

use crate::classifier;
use crate::model::{ConversationRecord, IntentClass};

/// How many agents participated in a conversation, bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPattern {
    /// Exactly one step.
    Direct,
    /// Exactly two steps.
    SimpleRouting,
    /// More than five steps.
    ComplexMultiAgent,
    /// Everything else (3–5 steps).
    StandardRouting,
}

/// How much data access occurred in a conversation, bucketed by total
/// data-operation count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataAccessPattern {
    /// Zero data operations.
    NoDataAccess,
    /// 1–2 data operations.
    Light,
    /// 3–5 data operations.
    Moderate,
    /// More than 5 data operations.
    Heavy,
}

/// Bucket the step count into a [`RoutingPattern`].
#[must_use]
pub fn routing_pattern(step_count: usize) -> RoutingPattern {
    match step_count {
        1 => RoutingPattern::Direct,
        2 => RoutingPattern::SimpleRouting,
        n if n > 5 => RoutingPattern::ComplexMultiAgent,
        _ => RoutingPattern::StandardRouting,
    }
}

/// Bucket the total data-operation count into a [`DataAccessPattern`].
#[must_use]
pub fn data_access_pattern(data_operation_count: usize) -> DataAccessPattern {
    match data_operation_count {
        0 => DataAccessPattern::NoDataAccess,
        1..=2 => DataAccessPattern::Light,
        3..=5 => DataAccessPattern::Moderate,
        _ => DataAccessPattern::Heavy,
    }
}

/// Classify the originating query's apparent intent, independent of C4's
/// response-aware classification — used only for the `analysis.json`
/// `patterns.query_type` field.
#[must_use]
pub fn query_type(query: &str) -> IntentClass {
    classifier::classify("", query)
}

/// The `patterns` block of `analysis.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patterns {
    /// The apparent intent of the originating query.
    pub query_type: IntentClass,
    /// How many agents the conversation routed through.
    pub routing_pattern: RoutingPattern,
    /// How much data access the conversation performed.
    pub data_access_pattern: DataAccessPattern,
}

/// Derive the full `patterns` block for a record.
#[must_use]
pub fn patterns(record: &ConversationRecord) -> Patterns {
    let data_operation_count: usize = record
        .agent_flow
        .iter()
        .map(|step| step.data_operations.len())
        .sum();
    Patterns {
        query_type: query_type(&record.user_query),
        routing_pattern: routing_pattern(record.agent_flow.len()),
        data_access_pattern: data_access_pattern(data_operation_count),
    }
}

/// Aggregate conversation-level counters, the `conversation_metrics`
/// block of `analysis.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMetrics {
    /// The conversation id.
    pub id: String,
    /// Total wall-clock duration of the session.
    pub duration_ms: i64,
    /// Whether the session completed successfully.
    pub success: bool,
    /// Count of distinct agents that contributed.
    pub agent_count: usize,
    /// Count of steps in `agent_flow`.
    pub step_count: usize,
    /// Total tool executions across all steps.
    pub tool_usage_count: u32,
    /// Total data operations across all steps.
    pub data_operations_count: u32,
}

/// One step's performance figures, an entry of the `agent_performance`
/// block of `analysis.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPerformance {
    /// The acting agent's name, or `None` if attribution failed.
    pub agent_name: Option<String>,
    /// The acting agent's id. This model attributes steps by name only,
    /// so the name doubles as the id, matching how
    /// `TracePayload::CollaboratorInvoke` names the callee.
    pub agent_id: Option<String>,
    /// Step duration in milliseconds.
    pub step_duration_ms: i64,
    /// Count of tools invoked during this step.
    pub tools_used: usize,
    /// Count of data operations performed during this step.
    pub data_operations: usize,
    /// Length of this step's assembled reasoning text.
    pub reasoning_length: usize,
}

/// The full `analysis.json` body (spec §4.6 "aggregate metrics and
/// per-step performance").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Conversation-level aggregate counters.
    pub conversation_metrics: ConversationMetrics,
    /// Per-step performance figures, in `agent_flow` order.
    pub agent_performance: Vec<AgentPerformance>,
    /// The routing/data-access/query-type pattern block.
    pub patterns: Patterns,
}

/// Derive the full `analysis.json` body for a record.
#[must_use]
pub fn analysis_report(record: &ConversationRecord) -> AnalysisReport {
    let conversation_metrics = ConversationMetrics {
        id: record.conversation_id.clone(),
        duration_ms: record.quality_signals.total_duration_ms,
        success: record.success,
        agent_count: record.agents_involved().len(),
        step_count: record.agent_flow.len(),
        tool_usage_count: record.function_audit.tool_executions,
        data_operations_count: record.function_audit.data_operations,
    };

    let agent_performance = record
        .agent_flow
        .iter()
        .map(|step| AgentPerformance {
            agent_name: step.agent_name.clone(),
            agent_id: step.agent_name.clone(),
            step_duration_ms: step.duration_ms(),
            tools_used: step.tools_used.len(),
            data_operations: step.data_operations.len(),
            reasoning_length: step.reasoning_breakdown.text_len(),
        })
        .collect();

    AnalysisReport {
        conversation_metrics,
        agent_performance,
        patterns: patterns(record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_pattern_bucket_boundaries() {
        assert_eq!(routing_pattern(1), RoutingPattern::Direct);
        assert_eq!(routing_pattern(2), RoutingPattern::SimpleRouting);
        assert_eq!(routing_pattern(3), RoutingPattern::StandardRouting);
        assert_eq!(routing_pattern(5), RoutingPattern::StandardRouting);
        assert_eq!(routing_pattern(6), RoutingPattern::ComplexMultiAgent);
    }

    #[test]
    fn data_access_pattern_bucket_boundaries() {
        assert_eq!(data_access_pattern(0), DataAccessPattern::NoDataAccess);
        assert_eq!(data_access_pattern(2), DataAccessPattern::Light);
        assert_eq!(data_access_pattern(5), DataAccessPattern::Moderate);
        assert_eq!(data_access_pattern(6), DataAccessPattern::Heavy);
    }

    #[test]
    fn analysis_report_has_all_three_sub_blocks() {
        use crate::model::{AgentStep, ToolExecution};
        use crate::recorder::parser::ReasoningBreakdown;
        use chrono::{TimeZone, Utc};

        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut record = ConversationRecord::new("conv-1", "sess-1", "C1", "Q4 revenue?", now);
        record.push_step(AgentStep {
            agent_name: Some("DataAgent".into()),
            attribution_confidence: 0.95,
            started_at: now,
            ended_at: now + chrono::Duration::milliseconds(250),
            reasoning_breakdown: ReasoningBreakdown::fallback("reasoning text", None),
            tools_used: vec![ToolExecution {
                tool_name: "run_sql_query".into(),
                parameters_summary: "select revenue".into(),
                result_summary: "ok".into(),
                success: true,
                execution_time_ms: Some(100),
            }],
            data_operations: Vec::new(),
            collaboration_sent: Vec::new(),
            collaboration_received: Vec::new(),
        });
        record.finish(now + chrono::Duration::milliseconds(250), "done", true, None);

        let report = analysis_report(&record);

        assert_eq!(report.conversation_metrics.id, "conv-1");
        assert_eq!(report.conversation_metrics.agent_count, 1);
        assert_eq!(report.conversation_metrics.step_count, 1);
        assert_eq!(report.conversation_metrics.tool_usage_count, 1);
        assert_eq!(report.conversation_metrics.data_operations_count, 0);

        assert_eq!(report.agent_performance.len(), 1);
        let step = &report.agent_performance[0];
        assert_eq!(step.agent_name.as_deref(), Some("DataAgent"));
        assert_eq!(step.step_duration_ms, 250);
        assert_eq!(step.tools_used, 1);
        assert_eq!(step.reasoning_length, "reasoning text".len());

        assert_eq!(report.patterns.query_type, query_type("Q4 revenue?"));
    }
}
