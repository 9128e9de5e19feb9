//! Outbound delivery payload construction (spec §6 "Outbound delivery
//! payload").
//!
//! Supplemented from `queue_processor_enhanced.py`'s
//! `format_webhook_response`: the payload additionally carries
//! `response_plain` (markdown stripped) alongside `response_rich`.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::IntentClass;

const SOURCE_SYSTEM: &str = "revops_ai_framework";
const SOURCE_PROCESS: &str = "webhook_gateway";

/// The `metadata` block of the outbound payload (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryMetadata {
    /// The conversation id, echoed back as the idempotency key.
    pub tracking_id: String,
    /// End-to-end processing time for this request.
    pub processing_time_ms: i64,
    /// When the payload was constructed.
    pub timestamp: DateTime<Utc>,
    /// Always `"revops_ai_framework"`.
    pub source_system: String,
    /// Always `"webhook_gateway"`.
    pub source_process: String,
}

/// The outbound delivery payload body (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPayload {
    /// The classified intent, as its canonical string.
    pub header: String,
    /// The final response, markdown intact.
    pub response_rich: String,
    /// The final response, markdown stripped.
    pub response_plain: String,
    /// The distinct agents that contributed to the response.
    pub agents_used: Vec<String>,
    /// Delivery/tracking metadata.
    pub metadata: DeliveryMetadata,
}

impl DeliveryPayload {
    /// Build the payload for a classified, agent-produced response.
    #[must_use]
    pub fn new(
        intent_class: IntentClass,
        response_rich: impl Into<String>,
        agents_used: Vec<String>,
        tracking_id: impl Into<String>,
        processing_time_ms: i64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let response_rich = response_rich.into();
        let response_plain = strip_markdown(&response_rich);
        Self {
            header: intent_class.as_str().to_owned(),
            response_rich,
            response_plain,
            agents_used,
            metadata: DeliveryMetadata {
                tracking_id: tracking_id.into(),
                processing_time_ms,
                timestamp,
                source_system: SOURCE_SYSTEM.to_owned(),
                source_process: SOURCE_PROCESS.to_owned(),
            },
        }
    }

    /// Serialize to the JSON body actually posted to the target
    /// endpoint.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] only on an internal invariant
    /// violation (non-finite float, non-UTF8 map key) — never in
    /// practice for this type's field shapes.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static MARKDOWN_EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\*\*\*|\*\*|\*|__|_)").unwrap());
static MARKDOWN_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s*").unwrap());
static MARKDOWN_CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```[a-zA-Z]*\n?").unwrap());
static MARKDOWN_INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]*)`").unwrap());
static MARKDOWN_BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[-*+]\s+").unwrap());

/// Strip common markdown syntax, leaving plain readable text. Not a full
/// CommonMark renderer — it targets the subset the agent's responses
/// actually use (bold/italic, headers, links, code fences/spans,
/// bullets).
#[must_use]
pub fn strip_markdown(text: &str) -> String {
    let without_links = MARKDOWN_LINK.replace_all(text, "$1");
    let without_code_fences = MARKDOWN_CODE_FENCE.replace_all(&without_links, "");
    let without_inline_code = MARKDOWN_INLINE_CODE.replace_all(&without_code_fences, "$1");
    let without_headers = MARKDOWN_HEADER.replace_all(&without_inline_code, "");
    let without_bullets = MARKDOWN_BULLET.replace_all(&without_headers, "");
    let without_emphasis = MARKDOWN_EMPHASIS.replace_all(&without_bullets, "");
    without_emphasis.trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn strips_bold_and_italic() {
        assert_eq!(strip_markdown("**Q4** revenue is *up*"), "Q4 revenue is up");
    }

    #[test]
    fn strips_headers_and_bullets() {
        let text = "# Summary\n- point one\n- point two";
        assert_eq!(strip_markdown(text), "Summary\npoint one\npoint two");
    }

    #[test]
    fn strips_links_keeping_label() {
        assert_eq!(strip_markdown("See [the report](https://x)"), "See the report");
    }

    #[test]
    fn payload_carries_both_rich_and_plain_response() {
        let payload = DeliveryPayload::new(
            IntentClass::DealAnalysis,
            "**IXIS** deal is closing",
            vec!["DealAgent".into()],
            "conv-1",
            1200,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        );
        assert_eq!(payload.header, "deal_analysis");
        assert_eq!(payload.response_plain, "IXIS deal is closing");
        assert_eq!(payload.metadata.source_system, "revops_ai_framework");
    }
}
