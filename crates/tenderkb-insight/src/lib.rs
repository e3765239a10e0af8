//! Precedent matching, insight extraction, recommendations and risk
//! consolidation over the procurement corpus.

mod aggregate;
mod analytics;
mod matcher;
mod recommend;
mod risk;
mod service;

pub use aggregate::{
    frequency_table, numeric_stats, summarize, summarize_records, summarize_top, DEFAULT_TOP_N,
};
pub use analytics::{
    analyze, by_category, general, trends, CategoryProfile, CorpusAnalytics, GeneralAnalytics,
    TrendAnalytics,
};
pub use matcher::{match_records, score};
pub use recommend::{competitiveness, recommend};
pub use risk::consolidate;
pub use service::{Consultation, KnowledgeBase, SimilarRecord, NO_PRECEDENT_MESSAGE};

pub const CRATE_NAME: &str = "tenderkb-insight";
