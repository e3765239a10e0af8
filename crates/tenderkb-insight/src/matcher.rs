use std::collections::HashSet;

use tenderkb_core::{MatchQuery, MatchResult, ProcurementRecord, SIMILARITY_THRESHOLD};

const CATEGORY_POINTS: u32 = 10;
const BIDDING_TYPE_POINTS: u32 = 5;
const SHARED_WORD_POINTS: u32 = 2;

/// Lexical similarity of one record to the query:
/// +10 same category, +5 same bidding type (only when the query names one),
/// +2 for every distinct lowercase word shared by the query text and the record's object.
pub fn score(query: &MatchQuery, record: &ProcurementRecord) -> u32 {
    let mut total = 0;
    if record.category == query.category {
        total += CATEGORY_POINTS;
    }

    if let (Some(wanted), Some(actual)) = (non_blank(query.bidding_type.as_deref()), record.bidding_type.as_deref()) {
        if wanted.to_lowercase() == actual.trim().to_lowercase() {
            total += BIDDING_TYPE_POINTS;
        }
    }

    if let Some(text) = non_blank(query.object.as_deref()) {
        let query_words = word_set(text);
        let shared = word_set(&record.object).intersection(&query_words).count() as u32;
        total += SHARED_WORD_POINTS * shared;
    }
    total
}

/// Scores the whole corpus and keeps records at or above the threshold,
/// best first. Equal scores keep corpus order.
pub fn match_records<'a>(query: &MatchQuery, corpus: &'a [ProcurementRecord]) -> Vec<MatchResult<'a>> {
    let mut results: Vec<MatchResult<'a>> = corpus
        .iter()
        .map(|record| MatchResult {
            record,
            similarity_score: score(query, record),
        })
        .filter(|m| m.similarity_score >= SIMILARITY_THRESHOLD)
        .collect();
    results.sort_by(|a, b| b.similarity_score.cmp(&a.similarity_score));
    results
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenderkb_core::Category;

    fn corpus() -> Vec<ProcurementRecord> {
        vec![
            ProcurementRecord::new("1", "limpeza predial", Category::Services),
            ProcurementRecord::new("2", "notebooks", Category::Goods),
            ProcurementRecord::new("3", "manutenção elevador", Category::Services),
        ]
    }

    #[test]
    fn ranks_text_overlap_above_category_only_matches() {
        let corpus = corpus();
        let query = MatchQuery::new(Category::Services).with_object("limpeza predial");
        let results = match_records(&query, &corpus);

        let ranked: Vec<_> = results
            .iter()
            .map(|m| (m.record.edital_number.as_str(), m.similarity_score))
            .collect();
        assert_eq!(ranked, vec![("1", 14), ("3", 10)]);
    }

    #[test]
    fn bidding_type_counts_only_when_queried() {
        let mut record = ProcurementRecord::new("9", "notebooks", Category::Goods);
        record.bidding_type = Some("Pregao".into());

        let with_type = MatchQuery::new(Category::Services).with_bidding_type("pregao");
        assert_eq!(score(&with_type, &record), 5);
        let blank_type = MatchQuery::new(Category::Services).with_bidding_type("  ");
        assert_eq!(score(&blank_type, &record), 0);
    }

    #[test]
    fn repeated_query_words_count_once() {
        let record = ProcurementRecord::new("1", "Limpeza predial", Category::Works);
        let query = MatchQuery::new(Category::Goods).with_object("limpeza LIMPEZA predial");
        assert_eq!(score(&query, &record), 4);
    }

    #[test]
    fn no_result_ever_falls_below_threshold() {
        let corpus = corpus();
        for category in Category::ALL {
            for text in ["", "limpeza", "notebooks novos", "elevador predial limpeza"] {
                let query = MatchQuery::new(category).with_object(text);
                assert!(match_records(&query, &corpus)
                    .iter()
                    .all(|m| m.similarity_score >= SIMILARITY_THRESHOLD));
            }
        }
    }

    #[test]
    fn equal_scores_keep_corpus_order_across_calls() {
        let corpus: Vec<_> = (0..6)
            .map(|i| ProcurementRecord::new(i.to_string(), "serviço comum", Category::Services))
            .collect();
        let query = MatchQuery::new(Category::Services);
        let first: Vec<_> = match_records(&query, &corpus)
            .iter()
            .map(|m| m.record.edital_number.clone())
            .collect();
        let second: Vec<_> = match_records(&query, &corpus)
            .iter()
            .map(|m| m.record.edital_number.clone())
            .collect();
        assert_eq!(first, vec!["0", "1", "2", "3", "4", "5"]);
        assert_eq!(first, second);
    }
}
