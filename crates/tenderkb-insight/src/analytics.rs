//! Corpus-wide descriptive analytics: totals, per-category profiles and
//! monthly trends over result dates.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tenderkb_core::{Category, NumericStats, ProcurementRecord};

use crate::aggregate::numeric_stats;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralAnalytics {
    pub total_records: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_bidding_type: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_stats: Option<NumericStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryProfile {
    pub category: Category,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_proposals: Option<f64>,
    pub source_sites: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAnalytics {
    /// Records per `YYYY-MM` of the result date.
    pub per_month: BTreeMap<String, usize>,
    pub first_period: Option<String>,
    pub last_period: Option<String>,
    /// Records without a usable result date.
    pub undated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusAnalytics {
    pub general: GeneralAnalytics,
    pub by_category: Vec<CategoryProfile>,
    pub trends: TrendAnalytics,
}

pub fn analyze(corpus: &[ProcurementRecord]) -> CorpusAnalytics {
    CorpusAnalytics {
        general: general(corpus),
        by_category: by_category(corpus),
        trends: trends(corpus),
    }
}

pub fn general(corpus: &[ProcurementRecord]) -> GeneralAnalytics {
    let mut by_category = BTreeMap::new();
    let mut by_bidding_type = BTreeMap::new();
    for record in corpus {
        *by_category
            .entry(record.category.as_str().to_string())
            .or_insert(0) += 1;
        let bidding_type = record
            .bidding_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("nao_informado");
        *by_bidding_type.entry(bidding_type.to_string()).or_insert(0) += 1;
    }
    let values: Vec<f64> = corpus.iter().filter_map(|r| r.reference_value()).collect();

    GeneralAnalytics {
        total_records: corpus.len(),
        by_category,
        by_bidding_type,
        value_stats: numeric_stats(&values),
    }
}

/// One profile per category present in the corpus, in `Category::ALL` order.
pub fn by_category(corpus: &[ProcurementRecord]) -> Vec<CategoryProfile> {
    Category::ALL
        .into_iter()
        .filter_map(|category| {
            let records: Vec<&ProcurementRecord> =
                corpus.iter().filter(|r| r.category == category).collect();
            if records.is_empty() {
                return None;
            }
            let values: Vec<f64> = records.iter().filter_map(|r| r.reference_value()).collect();
            let proposals: Vec<f64> = records
                .iter()
                .filter_map(|r| r.proposal_count)
                .map(f64::from)
                .collect();
            let source_sites: BTreeSet<String> = records
                .iter()
                .filter_map(|r| r.source_site.clone())
                .collect();

            Some(CategoryProfile {
                category,
                count: records.len(),
                mean_value: numeric_stats(&values).map(|s| s.mean),
                mean_proposals: numeric_stats(&proposals).map(|s| s.mean),
                source_sites: source_sites.into_iter().collect(),
            })
        })
        .collect()
}

pub fn trends(corpus: &[ProcurementRecord]) -> TrendAnalytics {
    let mut per_month: BTreeMap<String, usize> = BTreeMap::new();
    let mut undated = 0;
    for record in corpus {
        match record.result_date.as_deref().and_then(year_month) {
            Some(period) => *per_month.entry(period).or_insert(0) += 1,
            None => undated += 1,
        }
    }

    TrendAnalytics {
        first_period: per_month.keys().next().cloned(),
        last_period: per_month.keys().next_back().cloned(),
        per_month,
        undated,
    }
}

/// `YYYY-MM` prefix of an ISO date such as `2024-03-18`.
fn year_month(date: &str) -> Option<String> {
    let period = date.trim().get(..7)?;
    let (year, month) = period.split_once('-')?;
    let valid = year.len() == 4
        && month.len() == 2
        && year.chars().all(|c| c.is_ascii_digit())
        && matches!(month.parse::<u32>(), Ok(1..=12));
    valid.then(|| period.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        category: Category,
        bidding_type: Option<&str>,
        value: Option<f64>,
        result_date: Option<&str>,
        site: &str,
    ) -> ProcurementRecord {
        let mut r = ProcurementRecord::new("1", "objeto", category);
        r.bidding_type = bidding_type.map(str::to_string);
        r.contracted_value = value;
        r.result_date = result_date.map(str::to_string);
        r.source_site = Some(site.to_string());
        r
    }

    fn corpus() -> Vec<ProcurementRecord> {
        let mut with_proposals = record(
            Category::Services,
            Some("pregao"),
            Some(1000.0),
            Some("2024-03-10"),
            "ComprasNet",
        );
        with_proposals.proposal_count = Some(6);
        vec![
            with_proposals,
            record(Category::Services, Some("pregao"), Some(3000.0), Some("2024-03-28"), "Correios"),
            record(Category::Goods, None, None, Some("2023-11-02"), "ComprasNet"),
            record(Category::Services, Some(" "), None, Some("sem data"), "ComprasNet"),
        ]
    }

    #[test]
    fn general_counts_categories_and_bidding_types() {
        let general = general(&corpus());
        assert_eq!(general.total_records, 4);
        assert_eq!(general.by_category.get("servicos"), Some(&3));
        assert_eq!(general.by_category.get("bens"), Some(&1));
        assert_eq!(general.by_bidding_type.get("pregao"), Some(&2));
        assert_eq!(general.by_bidding_type.get("nao_informado"), Some(&2));
        assert_eq!(general.value_stats.unwrap().mean, 2000.0);
    }

    #[test]
    fn category_profiles_skip_missing_data() {
        let profiles = by_category(&corpus());
        let categories: Vec<_> = profiles.iter().map(|p| p.category).collect();
        assert_eq!(categories, vec![Category::Goods, Category::Services]);

        let goods = &profiles[0];
        assert_eq!(goods.count, 1);
        assert!(goods.mean_value.is_none());
        assert!(goods.mean_proposals.is_none());

        let services = &profiles[1];
        assert_eq!(services.mean_value, Some(2000.0));
        assert_eq!(services.mean_proposals, Some(6.0));
        assert_eq!(services.source_sites, vec!["ComprasNet", "Correios"]);
    }

    #[test]
    fn trends_group_by_month_with_span() {
        let trends = trends(&corpus());
        let months: Vec<_> = trends
            .per_month
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        assert_eq!(months, vec![("2023-11", 1), ("2024-03", 2)]);
        assert_eq!(trends.first_period.as_deref(), Some("2023-11"));
        assert_eq!(trends.last_period.as_deref(), Some("2024-03"));
        assert_eq!(trends.undated, 1);
    }

    #[test]
    fn empty_corpus_has_no_periods() {
        let analytics = analyze(&[]);
        assert_eq!(analytics.general.total_records, 0);
        assert!(analytics.general.value_stats.is_none());
        assert!(analytics.by_category.is_empty());
        assert!(analytics.trends.first_period.is_none());
    }
}
