//! Reasoning-text parser (spec §4.6 "Reasoning-text parser").
//!
//! Ported from `original_source/V5/integrations/slack-bedrock-gateway/
//! lambdas/processor/reasoning_parser.py`'s `ReasoningTextParser`,
//! re-expressed with the `regex` crate. The section markers, the
//! `Reference N: {...}` block shape, the `Based on X, I will Y`
//! decision-point templates, and the confidence-bucket derivation are
//! preserved exactly; the Python's dict-of-dicts output becomes a typed
//! [`ReasoningBreakdown`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Decision points are capped at five per step (spec §4.6).
const MAX_DECISION_POINTS: usize = 5;
/// Reference content snippets are truncated to 500 chars (spec §4.6).
const REFERENCE_SNIPPET_LIMIT: usize = 500;
/// The fallback excerpt length on parse failure (spec §4.6).
const FALLBACK_EXCERPT_LIMIT: usize = 1000;

static KB_SEARCH_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\[KNOWLEDGE BASE SEARCH\]\s*$").unwrap());
static OBSERVATION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\[OBSERVATION\]\s*$").unwrap());
static USER_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\[USER\]\s*$").unwrap());
static ASSISTANT_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\[ASSISTANT\]\s*$").unwrap());

static DATE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Current Date:\s*(.+)$").unwrap());
static QUARTER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Current Quarter:\s*(.+)$").unwrap());
static REQUEST_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^User Request:\s*(.+)$").unwrap());

static KB_QUERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Query:\s*(.+)$").unwrap());
static KB_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Knowledge Base:\s*(.+)$").unwrap());
static REFERENCE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)Reference\s+(\d+):\s*\{(.+?)\}").unwrap()
});
static REFERENCE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"id:\s*"?([^,"\n]+)"?"#).unwrap());
static REFERENCE_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"location:\s*"?([^,"\n]+)"?"#).unwrap());
static REFERENCE_CONTENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"content:\s*"(.*?)""#).unwrap());
static REFERENCE_METADATA_KEYS: LazyLock<[(Regex, &'static str); 3]> = LazyLock::new(|| {
    [
        (
            Regex::new(r#"x-amz-bedrock-kb-source-uri['"]?\s*:\s*['"]([^'"\n]*)['"]"#).unwrap(),
            "source_uri",
        ),
        (
            Regex::new(r#"x-amz-bedrock-kb-chunk-id['"]?\s*:\s*['"]([^'"\n]*)['"]"#).unwrap(),
            "chunk_id",
        ),
        (
            Regex::new(r#"x-amz-bedrock-kb-data-source-id['"]?\s*:\s*['"]([^'"\n]*)['"]"#).unwrap(),
            "data_source_id",
        ),
    ]
});

static TOOL_EXECUTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Tool:\s*(\S+)\s*\|\s*Params:\s*(.+?)\s*\|\s*Outcome:\s*(.+)$").unwrap()
});

static DECISION_POINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Based on ([^,]+), I will ([^.\n]+)").unwrap());

static APPROACH_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Approach:\s*(.+)$").unwrap());
static DATA_SOURCES_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Data Sources:\s*(.+)$").unwrap());

const SUCCESS_TOKENS: [&str; 2] = ["successfully", "confirmed"];
const ERROR_TOKENS: [&str; 2] = ["error", "failed"];

/// The preamble extracted from a `[USER]` section (spec §4.6 "Context
/// setup").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextSetup {
    /// The `Current Date: ...` line, verbatim.
    pub current_date_line: Option<String>,
    /// The `Current Quarter: ...` line, verbatim.
    pub current_quarter_line: Option<String>,
    /// The `User Request: ...` line, verbatim.
    pub user_request_line: Option<String>,
}

/// A single reference surfaced by a knowledge-base search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseReference {
    /// The reference's source id.
    pub id: String,
    /// A content snippet, truncated to 500 characters.
    pub content_snippet: String,
    /// The location URI of the source document.
    pub location_uri: String,
    /// Bedrock knowledge-base metadata captured from the reference block
    /// (`source_uri`, `chunk_id`, `data_source_id`), present only for the
    /// keys actually found. Empty when the block carries none.
    pub metadata: Vec<(String, String)>,
}

/// One knowledge-base search observed in a `[KNOWLEDGE BASE SEARCH]`
/// section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseSearch {
    /// The search query text.
    pub query: String,
    /// The knowledge-base identifier searched.
    pub knowledge_base_id: String,
    /// References returned by the search.
    pub references: Vec<KnowledgeBaseReference>,
}

/// A tool execution parsed directly out of reasoning text (distinct from
/// [`crate::model::ToolExecution`], which is normalized from trace
/// events — see `recorder::tool_normalize`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedToolExecution {
    /// The tool's name.
    pub tool_name: String,
    /// A digest of the parameters passed.
    pub parameters_digest: String,
    /// The outcome text (`success`, a row count, or an error message).
    pub outcome: String,
}

/// The confidence bucket derived for a step's final synthesis (spec §4.6
/// "Final synthesis").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBucket {
    /// Success tokens present, no error tokens.
    High,
    /// Neither success nor error tokens present.
    Medium,
    /// Error tokens present.
    Low,
}

/// The final-synthesis summary extracted from an `[ASSISTANT]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalSynthesis {
    /// The approach sentence.
    pub approach: Option<String>,
    /// Data sources referenced, as listed in the text.
    pub data_sources: Vec<String>,
    /// The derived confidence bucket.
    pub confidence: ConfidenceBucket,
}

/// The structured breakdown of one step's reasoning text (spec §4.6,
/// §3 `AgentStep::reasoning_breakdown`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningBreakdown {
    /// The extracted context-setup preamble, if the `[USER]` section was
    /// found.
    pub context_setup: Option<ContextSetup>,
    /// Knowledge-base searches found in `[KNOWLEDGE BASE SEARCH]`
    /// sections.
    pub knowledge_base_searches: Vec<KnowledgeBaseSearch>,
    /// Tool executions found in `[OBSERVATION]` sections.
    pub tool_executions: Vec<ParsedToolExecution>,
    /// Decision-point phrases, capped at 5.
    pub decision_points: Vec<String>,
    /// The final synthesis, if an `[ASSISTANT]` section was found.
    pub final_synthesis: Option<FinalSynthesis>,
    /// Present only on a parse failure; the error note.
    pub parsing_error: Option<String>,
    /// Present only on a parse failure; the first ≤1000 characters of
    /// the original text.
    pub original_reasoning_text: Option<String>,
    /// Length in characters of the original reasoning text, tracked
    /// regardless of parse success so quality signals remain meaningful
    /// even for fallback records.
    raw_len: usize,
}

impl ReasoningBreakdown {
    /// The original text's length in characters (spec §4.6 "Quality
    /// analysis": reasoning length per step).
    #[must_use]
    pub const fn text_len(&self) -> usize {
        self.raw_len
    }

    /// Build a fallback breakdown: the parser never raises (spec §4.6),
    /// it emits this instead, carrying a truncated excerpt of the
    /// original text and an explanatory note.
    #[must_use]
    pub fn fallback(text: &str, reason: Option<&str>) -> Self {
        let excerpt: String = text.chars().take(FALLBACK_EXCERPT_LIMIT).collect();
        Self {
            context_setup: None,
            knowledge_base_searches: Vec::new(),
            tool_executions: Vec::new(),
            decision_points: Vec::new(),
            final_synthesis: None,
            parsing_error: Some(
                reason
                    .unwrap_or("reasoning text did not match any recognized section markers")
                    .to_owned(),
            ),
            original_reasoning_text: Some(excerpt),
            raw_len: text.chars().count(),
        }
    }
}

/// Parses heterogeneous agent reasoning text into a [`ReasoningBreakdown`]
/// (spec §4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReasoningTextParser;

impl ReasoningTextParser {
    /// Parse `text`, never failing: on any internal inconsistency this
    /// returns [`ReasoningBreakdown::fallback`] rather than propagating
    /// an error.
    #[must_use]
    pub fn parse(self, text: &str) -> ReasoningBreakdown {
        let has_any_marker = USER_HEADER.is_match(text)
            || KB_SEARCH_HEADER.is_match(text)
            || OBSERVATION_HEADER.is_match(text)
            || ASSISTANT_HEADER.is_match(text);
        if !has_any_marker {
            return ReasoningBreakdown::fallback(text, None);
        }

        let context_setup = Self::extract_context_setup(text);
        let knowledge_base_searches = Self::extract_knowledge_base_searches(text);
        let tool_executions = Self::extract_tool_executions(text);
        let decision_points = Self::extract_decision_points(text);
        let final_synthesis = Self::extract_final_synthesis(text);

        ReasoningBreakdown {
            context_setup,
            knowledge_base_searches,
            tool_executions,
            decision_points,
            final_synthesis,
            parsing_error: None,
            original_reasoning_text: None,
            raw_len: text.chars().count(),
        }
    }

    fn extract_context_setup(text: &str) -> Option<ContextSetup> {
        if !USER_HEADER.is_match(text) {
            return None;
        }
        Some(ContextSetup {
            current_date_line: DATE_LINE.captures(text).map(|c| c[1].trim().to_owned()),
            current_quarter_line: QUARTER_LINE.captures(text).map(|c| c[1].trim().to_owned()),
            user_request_line: REQUEST_LINE.captures(text).map(|c| c[1].trim().to_owned()),
        })
    }

    fn extract_knowledge_base_searches(text: &str) -> Vec<KnowledgeBaseSearch> {
        if !KB_SEARCH_HEADER.is_match(text) {
            return Vec::new();
        }
        let query = KB_QUERY
            .captures(text)
            .map(|c| c[1].trim().to_owned())
            .unwrap_or_default();
        let knowledge_base_id = KB_ID
            .captures(text)
            .map(|c| c[1].trim().to_owned())
            .unwrap_or_default();

        let mut references = Vec::new();
        for caps in REFERENCE_BLOCK.captures_iter(text) {
            let body = &caps[2];
            let id = REFERENCE_ID
                .captures(body)
                .map_or_else(|| format!("reference-{}", &caps[1]), |c| c[1].trim().to_owned());
            let location_uri = REFERENCE_LOCATION
                .captures(body)
                .map(|c| c[1].trim().to_owned())
                .unwrap_or_default();
            let content_snippet = REFERENCE_CONTENT
                .captures(body)
                .map(|c| c[1].chars().take(REFERENCE_SNIPPET_LIMIT).collect())
                .unwrap_or_default();
            let metadata = REFERENCE_METADATA_KEYS
                .iter()
                .filter_map(|(pattern, key)| {
                    pattern
                        .captures(body)
                        .map(|c| ((*key).to_owned(), c[1].trim().to_owned()))
                })
                .collect();
            references.push(KnowledgeBaseReference {
                id,
                content_snippet,
                location_uri,
                metadata,
            });
        }

        if query.is_empty() && knowledge_base_id.is_empty() && references.is_empty() {
            return Vec::new();
        }
        vec![KnowledgeBaseSearch {
            query,
            knowledge_base_id,
            references,
        }]
    }

    fn extract_tool_executions(text: &str) -> Vec<ParsedToolExecution> {
        if !OBSERVATION_HEADER.is_match(text) {
            return Vec::new();
        }
        TOOL_EXECUTION
            .captures_iter(text)
            .map(|c| ParsedToolExecution {
                tool_name: c[1].trim().to_owned(),
                parameters_digest: c[2].trim().to_owned(),
                outcome: c[3].trim().to_owned(),
            })
            .collect()
    }

    fn extract_decision_points(text: &str) -> Vec<String> {
        DECISION_POINT
            .captures_iter(text)
            .take(MAX_DECISION_POINTS)
            .map(|c| format!("Based on {}, I will {}", c[1].trim(), c[2].trim()))
            .collect()
    }

    fn extract_final_synthesis(text: &str) -> Option<FinalSynthesis> {
        if !ASSISTANT_HEADER.is_match(text) {
            return None;
        }
        let approach = APPROACH_LINE.captures(text).map(|c| c[1].trim().to_owned());
        let data_sources = DATA_SOURCES_LINE
            .captures(text)
            .map(|c| {
                c[1]
                    .split(',')
                    .map(|s| s.trim().to_owned())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let lower = text.to_lowercase();
        let has_success = SUCCESS_TOKENS.iter().any(|t| lower.contains(t));
        let has_error = ERROR_TOKENS.iter().any(|t| lower.contains(t));
        let confidence = if has_error {
            ConfidenceBucket::Low
        } else if has_success {
            ConfidenceBucket::High
        } else {
            ConfidenceBucket::Medium
        };

        Some(FinalSynthesis {
            approach,
            data_sources,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_on_unrecognized_text() {
        let text = "just some plain text with no markers at all";
        let breakdown = ReasoningTextParser.parse(text);
        assert!(breakdown.parsing_error.is_some());
        assert_eq!(breakdown.original_reasoning_text.as_deref(), Some(text));
    }

    #[test]
    fn fallback_excerpt_truncated_to_1000_chars() {
        let text = "x".repeat(5000);
        let breakdown = ReasoningBreakdown::fallback(&text, Some("corrupt"));
        assert_eq!(breakdown.original_reasoning_text.unwrap().chars().count(), 1000);
        assert_eq!(breakdown.raw_len, 5000);
    }

    #[test]
    fn extracts_context_setup_from_user_section() {
        let text = "[USER]\nCurrent Date: 2025-08-14\nCurrent Quarter: Q3 2025\nUser Request: Q4 revenue?\n";
        let breakdown = ReasoningTextParser.parse(text);
        let ctx = breakdown.context_setup.unwrap();
        assert_eq!(ctx.current_date_line.as_deref(), Some("2025-08-14"));
        assert_eq!(ctx.user_request_line.as_deref(), Some("Q4 revenue?"));
    }

    #[test]
    fn extracts_decision_points_capped_at_five() {
        let mut text = String::from("[ASSISTANT]\n");
        for i in 0..8 {
            text.push_str(&format!("Based on signal {i}, I will act{i}.\n"));
        }
        let breakdown = ReasoningTextParser.parse(&text);
        assert_eq!(breakdown.decision_points.len(), 5);
        assert_eq!(breakdown.decision_points[0], "Based on signal 0, I will act0");
    }

    #[test]
    fn confidence_bucket_derives_from_token_presence() {
        let success_text = "[ASSISTANT]\nApproach: query succeeded\nThe query completed successfully.\n";
        assert_eq!(
            ReasoningTextParser.parse(success_text).final_synthesis.unwrap().confidence,
            ConfidenceBucket::High
        );

        let error_text = "[ASSISTANT]\nApproach: query failed\nThe query failed with an error.\n";
        assert_eq!(
            ReasoningTextParser.parse(error_text).final_synthesis.unwrap().confidence,
            ConfidenceBucket::Low
        );

        let neutral_text = "[ASSISTANT]\nApproach: summarized the findings\n";
        assert_eq!(
            ReasoningTextParser.parse(neutral_text).final_synthesis.unwrap().confidence,
            ConfidenceBucket::Medium
        );
    }

    #[test]
    fn parses_tool_executions_from_observation_section() {
        let text = "[OBSERVATION]\nTool: sql_query | Params: table=deals | Outcome: 42 rows\n";
        let breakdown = ReasoningTextParser.parse(text);
        assert_eq!(breakdown.tool_executions.len(), 1);
        assert_eq!(breakdown.tool_executions[0].tool_name, "sql_query");
        assert_eq!(breakdown.tool_executions[0].outcome, "42 rows");
    }

    #[test]
    fn extracts_reference_with_bedrock_metadata() {
        let text = r#"[KNOWLEDGE BASE SEARCH]
Query: Q4 pipeline
Knowledge Base: deals-kb
Reference 1: {id: "ref-1", location: "s3://bucket/doc.pdf", content: "Q4 pipeline is up", x-amz-bedrock-kb-source-uri: "s3://bucket/doc.pdf", x-amz-bedrock-kb-chunk-id: "chunk-9", x-amz-bedrock-kb-data-source-id: "ds-1"}
"#;
        let breakdown = ReasoningTextParser.parse(text);
        assert_eq!(breakdown.knowledge_base_searches.len(), 1);
        let references = &breakdown.knowledge_base_searches[0].references;
        assert_eq!(references.len(), 1);
        let reference = &references[0];
        assert_eq!(reference.id, "ref-1");
        assert_eq!(
            reference.metadata,
            vec![
                ("source_uri".to_owned(), "s3://bucket/doc.pdf".to_owned()),
                ("chunk_id".to_owned(), "chunk-9".to_owned()),
                ("data_source_id".to_owned(), "ds-1".to_owned()),
            ]
        );
    }

    #[test]
    fn reference_without_metadata_keys_yields_empty_metadata() {
        let text = r#"[KNOWLEDGE BASE SEARCH]
Query: Q4 pipeline
Knowledge Base: deals-kb
Reference 1: {id: "ref-1", location: "s3://bucket/doc.pdf", content: "Q4 pipeline is up"}
"#;
        let breakdown = ReasoningTextParser.parse(text);
        assert!(breakdown.knowledge_base_searches[0].references[0].metadata.is_empty());
    }
}
