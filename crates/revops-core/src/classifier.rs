//! Response Classifier (C4, spec §4.4).
//!
//! Canonical keyword tables resolved from `original_source`'s
//! `queue_processor_enhanced.py::classify_response_type` (the newest,
//! webhook-gateway classifier among several coexisting implementations
//! flagged in spec.md §9's Open Questions). The tie-break order (deal <
//! data < lead < general) is made explicit via [`IntentClass`]'s
//! declaration order rather than relying on an `if`/`elif` chain, so a
//! tie is a genuine tie rather than an artifact of evaluation order
//! (spec Testable Property 5).

use crate::model::IntentClass;

const DEAL_TERMS: &[&str] = &[
    "deal",
    "opportunity",
    "pipeline",
    "forecast",
    "closing",
    "negotiation",
    "contract",
];
const DATA_TERMS: &[&str] = &["data", "analysis", "query", "report", "metrics", "dashboard"];
const LEAD_TERMS: &[&str] = &[
    "lead",
    "prospect",
    "customer",
    "outreach",
    "conversion",
    "icp",
];

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn score(tokens: &[String], terms: &[&str]) -> usize {
    tokens.iter().filter(|t| terms.contains(&t.as_str())).count()
}

/// Classify an agent response plus its originating query into an
/// [`IntentClass`] (spec §4.4). Deterministic and pure: no external
/// calls, same inputs always produce the same output.
#[must_use]
pub fn classify(response_text: &str, original_query: &str) -> IntentClass {
    let combined = format!("{response_text} {original_query}");
    let tokens = tokenize(&combined);

    let scores = [
        (IntentClass::DealAnalysis, score(&tokens, DEAL_TERMS)),
        (IntentClass::DataAnalysis, score(&tokens, DATA_TERMS)),
        (IntentClass::LeadAnalysis, score(&tokens, LEAD_TERMS)),
    ];

    scores
        .into_iter()
        .filter(|(_, s)| *s > 0)
        .max_by(|(class_a, score_a), (class_b, score_b)| {
            score_a
                .cmp(score_b)
                .then_with(|| class_b.cmp(class_a))
        })
        .map_or(IntentClass::General, |(class, _)| class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_deal_language() {
        let class = classify("The IXIS deal is in the negotiation stage.", "status of deal?");
        assert_eq!(class, IntentClass::DealAnalysis);
    }

    #[test]
    fn classifies_data_language() {
        let class = classify("Here is the metrics dashboard you asked for.", "show me data");
        assert_eq!(class, IntentClass::DataAnalysis);
    }

    #[test]
    fn classifies_lead_language() {
        let class = classify("Outreach to this prospect is scheduled.", "lead status?");
        assert_eq!(class, IntentClass::LeadAnalysis);
    }

    #[test]
    fn unmatched_text_falls_back_to_general() {
        let class = classify("The weather today is sunny.", "how is the weather?");
        assert_eq!(class, IntentClass::General);
    }

    #[test]
    fn tie_breaks_to_smaller_ordinal() {
        let class = classify("deal data", "");
        assert_eq!(class, IntentClass::DealAnalysis);
    }

    #[test]
    fn is_deterministic() {
        let text = "query the pipeline and forecast the deal";
        assert_eq!(classify(text, ""), classify(text, ""));
    }
}
