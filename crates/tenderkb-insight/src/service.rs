use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tenderkb_core::{
    ConsolidatedRisk, InsightSummary, MatchQuery, ProcurementRecord, RiskInput,
};
use tenderkb_storage::{Clock, CorpusCache, CorpusStore, StorageError, SystemClock};
use tracing::info;

use crate::aggregate::summarize_top;
use crate::analytics::{analyze, CorpusAnalytics};
use crate::matcher::match_records;
use crate::recommend::recommend;
use crate::risk::consolidate;

pub const NO_PRECEDENT_MESSAGE: &str = "no similar tenders found in the knowledge base";

/// Owned copy of a match, detached from the cached snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarRecord {
    #[serde(flatten)]
    pub record: ProcurementRecord,
    pub similarity_score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consultation {
    /// Every record that cleared the threshold, not only the returned slice.
    pub found: usize,
    pub similar: Vec<SimilarRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<InsightSummary>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub consulted_at: DateTime<Utc>,
}

/// Query facade over a cached corpus snapshot. Built once per process and shared
/// by reference; concurrent consultations read the same snapshot.
pub struct KnowledgeBase {
    cache: CorpusCache,
    clock: Arc<dyn Clock>,
}

impl KnowledgeBase {
    pub fn new(store: CorpusStore, ttl: Duration) -> Self {
        Self::with_clock(store, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(store: CorpusStore, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: CorpusCache::with_clock(store, ttl, clock.clone()),
            clock,
        }
    }

    pub fn cache(&self) -> &CorpusCache {
        &self.cache
    }

    /// Ranks the corpus against `query`, returns the best `top_n` matches and the
    /// insights and recommendations drawn from them.
    pub async fn consult(
        &self,
        query: &MatchQuery,
        top_n: usize,
    ) -> Result<Consultation, StorageError> {
        let corpus = self.cache.snapshot().await?;
        let matches = match_records(query, &corpus);
        let consulted_at = self.clock.now();
        info!(
            category = query.category.as_str(),
            corpus = corpus.len(),
            found = matches.len(),
            "knowledge base consulted"
        );

        if matches.is_empty() {
            return Ok(Consultation {
                found: 0,
                similar: Vec::new(),
                insights: None,
                recommendations: Vec::new(),
                message: Some(NO_PRECEDENT_MESSAGE.to_string()),
                consulted_at,
            });
        }

        let insights = summarize_top(&matches, top_n.max(1));
        let recommendations = recommend(&insights);
        let similar = matches
            .iter()
            .take(top_n.max(1))
            .map(|m| SimilarRecord {
                record: m.record.clone(),
                similarity_score: m.similarity_score,
            })
            .collect();

        Ok(Consultation {
            found: matches.len(),
            similar,
            insights: Some(insights),
            recommendations,
            message: None,
            consulted_at,
        })
    }

    pub async fn analytics(&self) -> Result<CorpusAnalytics, StorageError> {
        let corpus = self.cache.snapshot().await?;
        Ok(analyze(&corpus))
    }

    pub fn assess_risk(&self, input: &RiskInput) -> ConsolidatedRisk {
        consolidate(input)
    }
}
