//! Multi-format export to the object store (spec §4.6 "Export", §6
//! "Object-store layout").
//!
//! Ported from `original_source/V5/monitoring/conversation_exporter.py`'s
//! `export_conversation`: one conversation produces five objects under a
//! date-partitioned prefix. `analysis.json` carries aggregate metrics,
//! per-step performance, and routing/data-access patterns (see
//! [`quality::AnalysisReport`]). Each write is independent; a failure on
//! one format does not prevent the others from being attempted (spec
//! §4.6 "Failure semantics": export failure is data loss for that
//! format, and must be alertable, not silently swallowed).

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ConversationRecord;
use crate::object_store::{ObjectMetadata, ObjectStore, ObjectStoreError};
use crate::recorder::quality;

/// The five export formats written per conversation.
pub const EXPORT_FORMATS: [&str; 5] = [
    "conversation.json",
    "conversation.txt",
    "analysis.json",
    "metadata.json",
    "traces.json",
];

/// One export format's write outcome.
#[derive(Debug)]
pub struct FormatResult {
    /// Which format this is (see [`EXPORT_FORMATS`]).
    pub format: &'static str,
    /// The object-store key written to.
    pub key: String,
    /// `Err` if this format's write failed; the other formats still
    /// attempt independently.
    pub outcome: Result<(), ObjectStoreError>,
}

/// Build the date-partitioned key prefix for a conversation export (spec
/// §6: `conversation-history/YYYY/MM/DD/{timestamp}_{conversation_id}/`).
#[must_use]
pub fn export_prefix(conversation_id: &str, exported_at: DateTime<Utc>) -> String {
    format!(
        "conversation-history/{}/{}_{}",
        exported_at.format("%Y/%m/%d"),
        exported_at.timestamp(),
        conversation_id,
    )
}

/// Render a `ConversationRecord` into a human-readable transcript (the
/// `conversation.txt` format).
#[must_use]
pub fn render_plain_transcript(record: &ConversationRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("Conversation: {}\n", record.conversation_id));
    out.push_str(&format!("Channel: {}\n", record.channel));
    out.push_str(&format!("Query: {}\n\n", record.user_query));
    for step in &record.agent_flow {
        let agent = step.agent_name.as_deref().unwrap_or("unknown agent");
        out.push_str(&format!(
            "--- {agent} (confidence {:.2}) ---\n",
            step.attribution_confidence
        ));
        for tool in &step.tools_used {
            out.push_str(&format!(
                "  tool: {} -> {}\n",
                tool.tool_name, tool.result_summary
            ));
        }
    }
    out.push_str(&format!("\nResponse:\n{}\n", record.final_response));
    out
}

/// Export failure summarizing which format(s) failed, for alerting.
#[derive(Debug, Error)]
#[error("conversation export had {failed_count} failing format(s) of {total}")]
pub struct ExportError {
    /// Total formats attempted.
    pub total: usize,
    /// Count of formats that failed.
    pub failed_count: usize,
    /// Per-format outcomes, success and failure alike.
    pub results: Vec<FormatResult>,
}

/// Export all five formats for `record` to `store`, returning per-format
/// outcomes. Every format is attempted even if an earlier one fails
/// (spec §4.6 "Export" is independent-per-format, not all-or-nothing).
///
/// # Errors
/// Returns [`ExportError`] if one or more formats failed to write; the
/// successfully-written formats are still durable and are not rolled
/// back.
pub async fn export_conversation(
    store: &dyn ObjectStore,
    record: &ConversationRecord,
    exported_at: DateTime<Utc>,
) -> Result<Vec<FormatResult>, ExportError> {
    let prefix = export_prefix(&record.conversation_id, exported_at);
    let source_system = record.channel.split(':').next().map(str::to_owned);

    let bodies: [(&str, Result<Vec<u8>, serde_json::Error>); 5] = [
        ("conversation.json", serde_json::to_vec(record)),
        (
            "conversation.txt",
            Ok(render_plain_transcript(record).into_bytes()),
        ),
        (
            "analysis.json",
            serde_json::to_vec(&quality::analysis_report(record)),
        ),
        (
            "metadata.json",
            serde_json::to_vec(&export_metadata(record, exported_at)),
        ),
        ("traces.json", serde_json::to_vec(&record.agent_flow)),
    ];

    let mut results = Vec::with_capacity(bodies.len());
    for (format, body) in bodies {
        let key = format!("{prefix}/{format}");
        let outcome = match body {
            Ok(body) => {
                let size_bytes = body.len();
                let metadata = ObjectMetadata {
                    conversation_id: record.conversation_id.clone(),
                    exported_at,
                    format: format.to_owned(),
                    channel: record.channel.clone(),
                    source_system: source_system.clone(),
                    size_bytes,
                };
                store.put_object(&key, Bytes::from(body), metadata).await
            }
            Err(error) => Err(ObjectStoreError::WriteFailed(format!(
                "failed to serialize {format}: {error}"
            ))),
        };
        if let Err(error) = &outcome {
            tracing::error!(
                conversation_id = %record.conversation_id,
                format,
                error = %error,
                "conversation export write failed, data for this format is lost"
            );
        }
        results.push(FormatResult {
            format,
            key,
            outcome,
        });
    }

    let failed_count = results.iter().filter(|r| r.outcome.is_err()).count();
    if failed_count > 0 {
        return Err(ExportError {
            total: results.len(),
            failed_count,
            results,
        });
    }
    Ok(results)
}

#[derive(Debug, serde::Serialize)]
struct ExportMetadata {
    conversation_id: String,
    session_id: String,
    channel: String,
    exported_at: DateTime<Utc>,
    has_errors: bool,
    agents_involved: Vec<String>,
}

fn export_metadata(record: &ConversationRecord, exported_at: DateTime<Utc>) -> ExportMetadata {
    ExportMetadata {
        conversation_id: record.conversation_id.clone(),
        session_id: record.session_id.clone(),
        channel: record.channel.clone(),
        exported_at,
        has_errors: record.has_errors(),
        agents_involved: record.agents_involved(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::InMemoryObjectStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn sample_record() -> ConversationRecord {
        let mut record = ConversationRecord::new("conv-1", "sess-1", "C1", "Q4 revenue?", now());
        record.finish(now(), "Q4 revenue is up 12%.", true, None);
        record
    }

    #[tokio::test]
    async fn writes_all_five_formats_under_date_partitioned_prefix() {
        let store = InMemoryObjectStore::new();
        let record = sample_record();
        let results = export_conversation(&store, &record, now()).await.unwrap();
        assert_eq!(results.len(), 5);
        for result in &results {
            assert!(result.key.starts_with("conversation-history/2025/06/15/"));
            assert!(result.key.ends_with(result.format));
        }
        assert_eq!(store.keys().len(), 5);
    }

    #[tokio::test]
    async fn each_format_independent_even_with_empty_agent_flow() {
        let store = InMemoryObjectStore::new();
        let record = sample_record();
        let results = export_conversation(&store, &record, now()).await.unwrap();
        assert!(results.iter().all(|r| r.outcome.is_ok()));
    }

    #[tokio::test]
    async fn analysis_json_carries_metrics_performance_and_patterns() {
        let store = InMemoryObjectStore::new();
        let record = sample_record();
        export_conversation(&store, &record, now()).await.unwrap();

        let key = format!("{}/analysis.json", export_prefix(&record.conversation_id, now()));
        let body = store.get(&key).unwrap();
        let analysis: quality::AnalysisReport = serde_json::from_slice(&body).unwrap();

        assert_eq!(analysis.conversation_metrics.id, "conv-1");
        assert_eq!(analysis.conversation_metrics.step_count, 0);
        assert!(analysis.agent_performance.is_empty());
        assert_eq!(analysis.patterns.query_type, quality::query_type("Q4 revenue?"));
    }
}
