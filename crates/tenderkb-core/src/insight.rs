use serde::{Deserialize, Serialize};

use crate::record::{Category, ProcurementRecord};

/// Minimum similarity score for a corpus record to count as precedent.
pub const SIMILARITY_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub category: Category,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub bidding_type: Option<String>,
}

impl MatchQuery {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            object: None,
            bidding_type: None,
        }
    }

    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn with_bidding_type(mut self, bidding_type: impl Into<String>) -> Self {
        self.bidding_type = Some(bidding_type.into());
        self
    }
}

/// A corpus record that cleared the similarity threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult<'a> {
    #[serde(flatten)]
    pub record: &'a ProcurementRecord,
    pub similarity_score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyEntry {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

/// Patterns distilled from a slice of matched records.
///
/// Statistic blocks are `None` (and absent from JSON) when no record in the slice
/// carried the underlying value, so "no data" never reads as zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InsightSummary {
    pub total_analyzed: usize,
    #[serde(default)]
    pub success_factors: Vec<FrequencyEntry>,
    #[serde(default)]
    pub technical_specs: Vec<FrequencyEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_stats: Option<NumericStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_stats: Option<NumericStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub judgment_criteria: Vec<FrequencyEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modalities: Vec<FrequencyEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_proposal_count: Option<f64>,
}

impl InsightSummary {
    /// Most used modality; ties resolve to the one seen first.
    pub fn preferred_modality(&self) -> Option<&FrequencyEntry> {
        self.modalities.first()
    }
}
