use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::fold_accents;

/// Categorical risk rating, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Baixo,
    Medio,
    Alto,
    Critico,
}

impl RiskLevel {
    pub fn ordinal(self) -> u32 {
        match self {
            RiskLevel::Baixo => 1,
            RiskLevel::Medio => 2,
            RiskLevel::Alto => 3,
            RiskLevel::Critico => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Baixo => "baixo",
            RiskLevel::Medio => "medio",
            RiskLevel::Alto => "alto",
            RiskLevel::Critico => "critico",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match fold_accents(label.trim()).to_lowercase().as_str() {
            "baixo" | "low" => Some(RiskLevel::Baixo),
            "medio" | "medium" => Some(RiskLevel::Medio),
            "alto" | "high" => Some(RiskLevel::Alto),
            "critico" | "critical" => Some(RiskLevel::Critico),
            _ => None,
        }
    }

    /// Unrecognized labels degrade to `Medio` so a malformed analysis never blocks.
    pub fn parse_lenient(label: &str) -> Self {
        Self::parse(label).unwrap_or(RiskLevel::Medio)
    }

    /// Category for a weighted score expressed in tenths (score × 10).
    ///
    /// Upper bounds are inclusive: 15 → baixo, 25 → medio, 35 → alto.
    pub fn from_score_tenths(tenths: u32) -> Self {
        match tenths {
            0..=15 => RiskLevel::Baixo,
            16..=25 => RiskLevel::Medio,
            26..=35 => RiskLevel::Alto,
            _ => RiskLevel::Critico,
        }
    }

    /// Same thresholds as [`RiskLevel::from_score_tenths`] for an arbitrary score.
    pub fn from_score(score: f64) -> Self {
        if score <= 1.5 {
            RiskLevel::Baixo
        } else if score <= 2.5 {
            RiskLevel::Medio
        } else if score <= 3.5 {
            RiskLevel::Alto
        } else {
            RiskLevel::Critico
        }
    }

    pub fn success_probability(self) -> f64 {
        match self {
            RiskLevel::Baixo => 0.85,
            RiskLevel::Medio => 0.65,
            RiskLevel::Alto => 0.35,
            RiskLevel::Critico => 0.15,
        }
    }

    pub fn recommendation(self) -> &'static str {
        match self {
            RiskLevel::Baixo | RiskLevel::Medio => "proceed, applying the suggested improvements",
            RiskLevel::Alto => "review critical points before proceeding",
            RiskLevel::Critico => "do not proceed without full review",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Independent analysis axis feeding the consolidated score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskDomain {
    Legal,
    Technical,
    Financial,
}

impl RiskDomain {
    pub const ALL: [RiskDomain; 3] = [RiskDomain::Legal, RiskDomain::Technical, RiskDomain::Financial];

    /// Weight in tenths; the three weights sum to 10.
    pub fn weight_tenths(self) -> u32 {
        match self {
            RiskDomain::Legal => 4,
            RiskDomain::Technical | RiskDomain::Financial => 3,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let folded = fold_accents(name.trim()).to_lowercase();
        let bare = folded.strip_prefix("risco_").unwrap_or(&folded);
        match bare {
            "legal" | "juridico" => Some(RiskDomain::Legal),
            "technical" | "tecnico" => Some(RiskDomain::Technical),
            "financial" | "financeiro" => Some(RiskDomain::Financial),
            _ => None,
        }
    }

    pub fn risk_factor(self) -> &'static str {
        match self {
            RiskDomain::Legal => "Legal non-compliance",
            RiskDomain::Technical => "Inadequate technical specifications",
            RiskDomain::Financial => "Values out of line with the market",
        }
    }

    pub fn mitigation(self) -> &'static str {
        match self {
            RiskDomain::Legal => "Review legal aspects before publication",
            RiskDomain::Technical => "Simplify or adjust technical specifications",
            RiskDomain::Financial => "Review price research and estimated values",
        }
    }
}

/// Named categorical ratings, e.g. `{"legal": "alto", "technical": "baixo"}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskInput {
    ratings: BTreeMap<String, String>,
}

impl RiskInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, domain: RiskDomain, level: RiskLevel) -> Self {
        self.ratings
            .insert(format!("{domain:?}").to_lowercase(), level.as_str().to_string());
        self
    }

    pub fn rate(mut self, domain_name: impl Into<String>, label: impl Into<String>) -> Self {
        self.ratings.insert(domain_name.into(), label.into());
        self
    }

    /// Resolved level for a domain; `Medio` when no entry names it.
    pub fn level_for(&self, domain: RiskDomain) -> RiskLevel {
        self.ratings
            .iter()
            .find(|(name, _)| RiskDomain::parse(name) == Some(domain))
            .map(|(_, label)| RiskLevel::parse_lenient(label))
            .unwrap_or(RiskLevel::Medio)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskBreakdown {
    pub legal: RiskLevel,
    pub technical: RiskLevel,
    pub financial: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedRisk {
    pub category: RiskLevel,
    pub weighted_score: f64,
    pub success_probability: f64,
    pub risk_factors: Vec<String>,
    pub mitigation_actions: Vec<String>,
    pub recommendation: String,
    pub breakdown: RiskBreakdown,
}
