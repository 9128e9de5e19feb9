//! `IntentClass` (spec §3): the C4 classification output, with a fixed
//! ordinal order used for tie-breaks (spec §4.4).

use serde::{Deserialize, Serialize};

/// The routing category assigned to an agent response.
///
/// Variant declaration order IS the tie-break order: `deal_analysis` <
/// `data_analysis` < `lead_analysis` < `general`. [`Ord`] is derived from
/// that order, so `classify` can simply pick the minimum among ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentClass {
    /// Deal/opportunity/pipeline language.
    DealAnalysis,
    /// Data/metrics/reporting language.
    DataAnalysis,
    /// Lead/prospect/outreach language.
    LeadAnalysis,
    /// No curated term set matched.
    General,
}

impl IntentClass {
    /// The canonical lower-snake-case name used in delivery payload
    /// headers and configuration keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DealAnalysis => "deal_analysis",
            Self::DataAnalysis => "data_analysis",
            Self::LeadAnalysis => "lead_analysis",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for IntentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
