use tenderkb_core::InsightSummary;

const GOOD_COMPETITION: f64 = 8.0;
const MODERATE_COMPETITION: f64 = 5.0;

/// Actionable lines derived from an insight summary, in a fixed order.
/// A line is skipped when its statistic is absent.
pub fn recommend(summary: &InsightSummary) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(top) = summary.success_factors.first() {
        lines.push(format!(
            "Apply: {} (present in {} similar tenders)",
            top.value, top.count
        ));
    }
    if let Some(top) = summary.technical_specs.first() {
        lines.push(format!(
            "Consider specification: {} (used in {} cases)",
            top.value, top.count
        ));
    }
    if let Some(values) = &summary.value_stats {
        lines.push(format!(
            "Suggested reference value: R$ {} (based on similar tenders)",
            grouped_amount(values.mean)
        ));
    }
    if let Some(durations) = &summary.duration_stats {
        lines.push(format!(
            "Suggested execution term: {} days (based on similar cases)",
            durations.mean.trunc() as u64
        ));
    }
    if let Some(mode) = summary.preferred_modality() {
        lines.push(format!(
            "Recommended modality: {} (used in {} cases)",
            mode.value, mode.count
        ));
    }
    if let Some(mean) = summary.mean_proposal_count {
        lines.push(competitiveness(mean).to_string());
    }
    lines
}

/// Two decimals with comma-grouped thousands, e.g. `1,234,567.89`.
fn grouped_amount(value: f64) -> String {
    let fixed = format!("{value:.2}");
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let (sign, digits) = match whole.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", whole),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}{grouped}.{cents}")
}

pub fn competitiveness(mean_proposals: f64) -> &'static str {
    if mean_proposals >= GOOD_COMPETITION {
        "good competitiveness, keep current specs"
    } else if mean_proposals >= MODERATE_COMPETITION {
        "moderate, consider relaxing specs"
    } else {
        "low competitiveness, revise specs to widen participation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenderkb_core::{FrequencyEntry, NumericStats};

    fn entry(value: &str, count: usize) -> FrequencyEntry {
        FrequencyEntry {
            value: value.to_string(),
            count,
        }
    }

    fn stats(mean: f64) -> NumericStats {
        NumericStats {
            min: mean,
            max: mean,
            mean,
            median: mean,
        }
    }

    #[test]
    fn full_summary_emits_every_line_in_order() {
        let summary = InsightSummary {
            total_analyzed: 3,
            success_factors: vec![entry("Prazo adequado", 3), entry("Outro", 1)],
            technical_specs: vec![entry("ISO 9001", 2)],
            value_stats: Some(stats(152_340.5)),
            duration_stats: Some(stats(45.8)),
            judgment_criteria: vec![entry("menor_preco", 3)],
            modalities: vec![entry("eletronica", 2), entry("presencial", 1)],
            mean_proposal_count: Some(6.5),
        };

        assert_eq!(
            recommend(&summary),
            vec![
                "Apply: Prazo adequado (present in 3 similar tenders)",
                "Consider specification: ISO 9001 (used in 2 cases)",
                "Suggested reference value: R$ 152,340.50 (based on similar tenders)",
                "Suggested execution term: 45 days (based on similar cases)",
                "Recommended modality: eletronica (used in 2 cases)",
                "moderate, consider relaxing specs",
            ]
        );
    }

    #[test]
    fn absent_statistics_skip_their_lines() {
        let summary = InsightSummary {
            total_analyzed: 1,
            technical_specs: vec![entry("NR-10", 1)],
            ..Default::default()
        };
        assert_eq!(
            recommend(&summary),
            vec!["Consider specification: NR-10 (used in 1 cases)"]
        );
        assert!(recommend(&InsightSummary::default()).is_empty());
    }

    #[test]
    fn reference_values_group_thousands() {
        assert_eq!(grouped_amount(0.0), "0.00");
        assert_eq!(grouped_amount(999.994), "999.99");
        assert_eq!(grouped_amount(1000.0), "1,000.00");
        assert_eq!(grouped_amount(1_234_567.891), "1,234,567.89");
    }

    #[test]
    fn competitiveness_buckets() {
        assert_eq!(competitiveness(8.0), "good competitiveness, keep current specs");
        assert_eq!(competitiveness(12.3), "good competitiveness, keep current specs");
        assert_eq!(competitiveness(7.9), "moderate, consider relaxing specs");
        assert_eq!(competitiveness(5.0), "moderate, consider relaxing specs");
        assert_eq!(
            competitiveness(4.99),
            "low competitiveness, revise specs to widen participation"
        );
    }
}
