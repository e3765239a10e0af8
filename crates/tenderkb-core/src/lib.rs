//! Core procurement domain model shared by the collector and the insight engine.

mod insight;
mod outcome;
mod record;
mod risk;

pub use insight::{
    FrequencyEntry, InsightSummary, MatchQuery, MatchResult, NumericStats, SIMILARITY_THRESHOLD,
};
pub use outcome::{LegacyDefaults, OutcomeRecord};
pub use record::{
    edital_key, fold_accents, Category, NormalizeError, ProcurementRecord, RecordDraft,
};
pub use risk::{ConsolidatedRisk, RiskBreakdown, RiskDomain, RiskInput, RiskLevel};

pub const CRATE_NAME: &str = "tenderkb-core";
