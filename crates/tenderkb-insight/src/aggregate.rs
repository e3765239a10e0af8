use tenderkb_core::{FrequencyEntry, InsightSummary, MatchResult, NumericStats, ProcurementRecord};

/// Reference slice size for insight extraction.
pub const DEFAULT_TOP_N: usize = 5;

/// Patterns across the given matches. Callers pass the slice they want analysed,
/// usually the first [`DEFAULT_TOP_N`] results.
pub fn summarize(matches: &[MatchResult<'_>]) -> InsightSummary {
    summarize_records(matches.iter().map(|m| m.record))
}

pub fn summarize_top(matches: &[MatchResult<'_>], top_n: usize) -> InsightSummary {
    summarize(&matches[..top_n.min(matches.len())])
}

pub fn summarize_records<'a, I>(records: I) -> InsightSummary
where
    I: IntoIterator<Item = &'a ProcurementRecord>,
{
    let records: Vec<&ProcurementRecord> = records.into_iter().collect();

    let values: Vec<f64> = records.iter().filter_map(|r| r.reference_value()).collect();
    let durations: Vec<f64> = records
        .iter()
        .filter_map(|r| r.execution_term_days)
        .map(f64::from)
        .collect();
    let proposals: Vec<f64> = records
        .iter()
        .filter_map(|r| r.proposal_count)
        .map(f64::from)
        .collect();

    InsightSummary {
        total_analyzed: records.len(),
        success_factors: frequency_table(
            records
                .iter()
                .flat_map(|r| r.success_factors.iter().map(String::as_str)),
        ),
        technical_specs: frequency_table(
            records
                .iter()
                .flat_map(|r| r.technical_specs.iter().map(String::as_str)),
        ),
        value_stats: numeric_stats(&values),
        duration_stats: numeric_stats(&durations),
        judgment_criteria: frequency_table(records.iter().filter_map(|r| r.judgment_criterion.as_deref())),
        modalities: frequency_table(records.iter().filter_map(|r| r.modality.as_deref())),
        mean_proposal_count: mean(&proposals),
    }
}

/// Every distinct value with its count, most frequent first; ties keep first-seen order.
pub fn frequency_table<'a, I>(values: I) -> Vec<FrequencyEntry>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut table: Vec<FrequencyEntry> = Vec::new();
    for value in values {
        match table.iter_mut().find(|e| e.value == value) {
            Some(entry) => entry.count += 1,
            None => table.push(FrequencyEntry {
                value: value.to_string(),
                count: 1,
            }),
        }
    }
    table.sort_by(|a, b| b.count.cmp(&a.count));
    table
}

/// `None` for an empty input. Non-finite or negative values are ignored.
pub fn numeric_stats(values: &[f64]) -> Option<NumericStats> {
    let mut sorted: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let len = sorted.len();
    let median = if len % 2 == 1 {
        sorted[len / 2]
    } else {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    };
    Some(NumericStats {
        min: sorted[0],
        max: sorted[len - 1],
        mean: sorted.iter().sum::<f64>() / len as f64,
        median,
    })
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
