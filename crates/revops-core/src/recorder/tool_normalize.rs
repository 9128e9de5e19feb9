//! Tool-execution normalization (spec §4.6 "Tool-execution
//! normalization").
//!
//! The raw trace stream may carry a tool invocation and its matching
//! output as separate events, possibly separated by other events; this
//! pairs them by monotonic order (FIFO per tool name) and deduplicates
//! repeats, since the same tool call can surface both as a trace event
//! and inside a later summary.

use std::collections::{HashSet, VecDeque};

use crate::model::{ToolExecution, TraceEvent, TracePayload};

/// Pair `ToolInvoke`/`ToolOutput` events from `events` into normalized
/// [`ToolExecution`] records (spec §3 `AgentStep::tools_used` shape).
#[must_use]
pub fn normalize(events: &[TraceEvent]) -> Vec<ToolExecution> {
    let mut pending: std::collections::HashMap<String, VecDeque<(usize, chrono::DateTime<chrono::Utc>, String)>> =
        std::collections::HashMap::new();
    let mut executions = Vec::new();

    for event in events {
        match &event.payload {
            TracePayload::ToolInvoke {
                name,
                parameters_digest,
            } => {
                pending
                    .entry(name.clone())
                    .or_default()
                    .push_back((0, event.timestamp, parameters_digest.clone()));
            }
            TracePayload::ToolOutput {
                name,
                success,
                result_summary,
            } => {
                let invoke = pending.get_mut(name).and_then(VecDeque::pop_front);
                let (parameters_summary, execution_time_ms) = match invoke {
                    Some((_, invoked_at, digest)) => (
                        digest,
                        Some((event.timestamp - invoked_at).num_milliseconds()),
                    ),
                    None => (String::new(), None),
                };
                executions.push(ToolExecution {
                    tool_name: name.clone(),
                    parameters_summary,
                    result_summary: result_summary.clone(),
                    success: *success,
                    execution_time_ms,
                });
            }
            _ => {}
        }
    }

    dedup(executions)
}

fn dedup(executions: Vec<ToolExecution>) -> Vec<ToolExecution> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(executions.len());
    for execution in executions {
        let key = (
            execution.tool_name.clone(),
            execution.parameters_summary.clone(),
            execution.result_summary.clone(),
        );
        if seen.insert(key) {
            out.push(execution);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event_at(secs: i64, payload: TracePayload) -> TraceEvent {
        TraceEvent::new(
            payload,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs),
        )
    }

    #[test]
    fn pairs_invoke_and_output_across_intervening_events() {
        let events = vec![
            event_at(
                0,
                TracePayload::ToolInvoke {
                    name: "sql_query".into(),
                    parameters_digest: "table=deals".into(),
                },
            ),
            event_at(1, TracePayload::Chunk { text: "...".into() }),
            event_at(
                3,
                TracePayload::ToolOutput {
                    name: "sql_query".into(),
                    success: true,
                    result_summary: "42 rows".into(),
                },
            ),
        ];
        let normalized = normalize(&events);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].parameters_summary, "table=deals");
        assert_eq!(normalized[0].execution_time_ms, Some(3000));
    }

    #[test]
    fn deduplicates_identical_executions() {
        let events = vec![
            event_at(
                0,
                TracePayload::ToolOutput {
                    name: "sql_query".into(),
                    success: true,
                    result_summary: "42 rows".into(),
                },
            ),
            event_at(
                1,
                TracePayload::ToolOutput {
                    name: "sql_query".into(),
                    success: true,
                    result_summary: "42 rows".into(),
                },
            ),
        ];
        let normalized = normalize(&events);
        assert_eq!(normalized.len(), 1);
    }

    #[test]
    fn unmatched_output_yields_execution_with_no_duration() {
        let events = vec![event_at(
            0,
            TracePayload::ToolOutput {
                name: "sql_query".into(),
                success: false,
                result_summary: "timeout".into(),
            },
        )];
        let normalized = normalize(&events);
        assert_eq!(normalized.len(), 1);
        assert!(normalized[0].execution_time_ms.is_none());
    }
}
