use tenderkb_core::{ConsolidatedRisk, RiskBreakdown, RiskDomain, RiskInput, RiskLevel};

/// Ordinal from which a domain contributes a risk factor and mitigation.
const FLAGGED_ORDINAL: u32 = 3;

/// Weighted consolidation of the legal, technical and financial ratings.
///
/// The score is accumulated in integer tenths (4·L + 3·T + 3·F) so the category
/// thresholds compare exactly; a score of 2.5 is `medio`, never `alto`.
pub fn consolidate(input: &RiskInput) -> ConsolidatedRisk {
    let breakdown = RiskBreakdown {
        legal: input.level_for(RiskDomain::Legal),
        technical: input.level_for(RiskDomain::Technical),
        financial: input.level_for(RiskDomain::Financial),
    };

    let mut tenths = 0;
    let mut risk_factors = Vec::new();
    let mut mitigation_actions = Vec::new();
    for domain in RiskDomain::ALL {
        let level = level_in(&breakdown, domain);
        tenths += domain.weight_tenths() * level.ordinal();
        if level.ordinal() >= FLAGGED_ORDINAL {
            risk_factors.push(domain.risk_factor().to_string());
            mitigation_actions.push(domain.mitigation().to_string());
        }
    }

    let category = RiskLevel::from_score_tenths(tenths);
    ConsolidatedRisk {
        category,
        weighted_score: f64::from(tenths) / 10.0,
        success_probability: category.success_probability(),
        risk_factors,
        mitigation_actions,
        recommendation: category.recommendation().to_string(),
        breakdown,
    }
}

fn level_in(breakdown: &RiskBreakdown, domain: RiskDomain) -> RiskLevel {
    match domain {
        RiskDomain::Legal => breakdown.legal,
        RiskDomain::Technical => breakdown.technical,
        RiskDomain::Financial => breakdown.financial,
    }
}
