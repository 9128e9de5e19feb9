//! Agent attribution (spec §4.6 "Agent attribution").
//!
//! Trace events do not always name the invoking agent explicitly, so
//! attribution is inferred by combining, in descending order of
//! confidence: (a) collaborator-invocation events that name the callee,
//! (b) handoff phrases in rationale text, (c) proximity to known tool
//! usage. A confidence score accompanies every attribution;
//! low-confidence attributions are retained, not discarded.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{TraceEvent, TracePayload};

static HANDOFF_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)hand(?:ing|ed)?\s+off\s+to\s+([A-Za-z][A-Za-z0-9_ ]{1,40})").unwrap()
});

/// `(tool-name substring, owning agent)` pairs used for the lowest-
/// confidence proximity inference.
const TOOL_OWNER_HINTS: &[(&str, &str)] = &[
    ("sql", "DataAgent"),
    ("warehouse", "DataAgent"),
    ("crm", "CRMAgent"),
    ("deal", "DealAgent"),
    ("lead", "LeadAgent"),
    ("prospect", "LeadAgent"),
];

/// Confidence assigned when a collaborator-invocation event names the
/// callee directly.
pub const CONFIDENCE_COLLABORATOR_INVOKE: f64 = 0.95;
/// Confidence assigned when a handoff phrase is found in rationale text.
pub const CONFIDENCE_HANDOFF_PHRASE: f64 = 0.6;
/// Confidence assigned when inference falls back to tool-name proximity.
pub const CONFIDENCE_TOOL_PROXIMITY: f64 = 0.35;

/// The result of attributing a step to an acting agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    /// The inferred agent name, or `None` if no signal was found at all.
    pub agent_name: Option<String>,
    /// Confidence in `agent_name`, in `[0.0, 1.0]`.
    pub confidence: f64,
}

/// Infer which agent produced `events` (one step's worth of trace
/// events), trying each signal in descending confidence order.
#[must_use]
pub fn attribute(events: &[TraceEvent]) -> Attribution {
    if let Some(name) = collaborator_invoke_name(events) {
        return Attribution {
            agent_name: Some(name),
            confidence: CONFIDENCE_COLLABORATOR_INVOKE,
        };
    }

    if let Some(name) = handoff_phrase_name(events) {
        return Attribution {
            agent_name: Some(name),
            confidence: CONFIDENCE_HANDOFF_PHRASE,
        };
    }

    if let Some(name) = tool_proximity_name(events) {
        return Attribution {
            agent_name: Some(name),
            confidence: CONFIDENCE_TOOL_PROXIMITY,
        };
    }

    Attribution {
        agent_name: None,
        confidence: 0.0,
    }
}

fn collaborator_invoke_name(events: &[TraceEvent]) -> Option<String> {
    events.iter().rev().find_map(|event| match &event.payload {
        TracePayload::CollaboratorInvoke { name, .. } => Some(name.clone()),
        _ => None,
    })
}

fn handoff_phrase_name(events: &[TraceEvent]) -> Option<String> {
    events.iter().rev().find_map(|event| match &event.payload {
        TracePayload::Rationale { text } => HANDOFF_PHRASE
            .captures(text)
            .map(|c| c[1].trim().to_owned()),
        _ => None,
    })
}

fn tool_proximity_name(events: &[TraceEvent]) -> Option<String> {
    events.iter().find_map(|event| match &event.payload {
        TracePayload::ToolInvoke { name, .. } => {
            let lower = name.to_lowercase();
            TOOL_OWNER_HINTS
                .iter()
                .find(|(hint, _)| lower.contains(hint))
                .map(|(_, owner)| (*owner).to_owned())
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(payload: TracePayload) -> TraceEvent {
        TraceEvent::new(payload, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn prefers_collaborator_invoke_over_other_signals() {
        let events = vec![
            event(TracePayload::Rationale {
                text: "handing off to LeadAgent for outreach".into(),
            }),
            event(TracePayload::CollaboratorInvoke {
                name: "DataAgent".into(),
                input_summary: None,
            }),
        ];
        let attribution = attribute(&events);
        assert_eq!(attribution.agent_name.as_deref(), Some("DataAgent"));
        assert_eq!(attribution.confidence, CONFIDENCE_COLLABORATOR_INVOKE);
    }

    #[test]
    fn falls_back_to_handoff_phrase() {
        let events = vec![event(TracePayload::Rationale {
            text: "I am handing off to CRMAgent now".into(),
        })];
        let attribution = attribute(&events);
        assert_eq!(attribution.agent_name.as_deref(), Some("CRMAgent"));
        assert_eq!(attribution.confidence, CONFIDENCE_HANDOFF_PHRASE);
    }

    #[test]
    fn falls_back_to_tool_proximity_with_low_confidence() {
        let events = vec![event(TracePayload::ToolInvoke {
            name: "run_sql_query".into(),
            parameters_digest: "abc".into(),
        })];
        let attribution = attribute(&events);
        assert_eq!(attribution.agent_name.as_deref(), Some("DataAgent"));
        assert_eq!(attribution.confidence, CONFIDENCE_TOOL_PROXIMITY);
    }

    #[test]
    fn no_signal_yields_none_with_zero_confidence() {
        let events = vec![event(TracePayload::Chunk { text: "hi".into() })];
        let attribution = attribute(&events);
        assert!(attribution.agent_name.is_none());
        assert_eq!(attribution.confidence, 0.0);
    }
}
