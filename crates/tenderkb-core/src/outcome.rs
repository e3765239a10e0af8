use serde::{Deserialize, Serialize};

use crate::record::{Category, NormalizeError, ProcurementRecord, RecordDraft};

/// One entry of the separately-maintained outcome history (`historico_editais.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    #[serde(rename = "id_edital", default)]
    pub edital_id: String,
    #[serde(rename = "objeto", default)]
    pub object: String,
    #[serde(rename = "categoria", default)]
    pub category: String,
    #[serde(rename = "tipo_licitacao", default)]
    pub bidding_type: Option<String>,
    #[serde(rename = "sucesso", default)]
    pub success: bool,
    #[serde(rename = "motivo_fracasso", default)]
    pub failure_reason: Option<String>,
    #[serde(rename = "licoes_aprendidas", default)]
    pub lessons_learned: Vec<String>,
    #[serde(rename = "data_resultado", default)]
    pub result_date: Option<String>,
    #[serde(rename = "valor_contratado", default)]
    pub contracted_value: Option<f64>,
    #[serde(rename = "numero_propostas", default)]
    pub proposal_count: Option<u32>,
    #[serde(rename = "fatores_sucesso", default)]
    pub success_factors: Vec<String>,
    #[serde(rename = "fatores_fracasso", default)]
    pub failure_factors: Vec<String>,
}

/// Values the outcome history does not carry and the corpus shape expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyDefaults {
    pub modality: String,
    pub issuing_body: String,
    pub judgment_criterion: String,
    pub source_site: String,
}

impl Default for LegacyDefaults {
    fn default() -> Self {
        Self {
            modality: "eletronica".to_string(),
            issuing_body: "Correios".to_string(),
            judgment_criterion: "menor_preco".to_string(),
            source_site: "Historico Interno".to_string(),
        }
    }
}

impl OutcomeRecord {
    /// Lessons learned first, then explicit success factors, duplicates dropped.
    pub fn merged_success_factors(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for factor in self.lessons_learned.iter().chain(&self.success_factors) {
            if !out.contains(factor) {
                out.push(factor.clone());
            }
        }
        out
    }

    /// Field-mapping adapter into the corpus shape, validated through the same
    /// boundary as scraped drafts.
    pub fn to_record(&self, defaults: &LegacyDefaults) -> Result<ProcurementRecord, NormalizeError> {
        let draft = RecordDraft {
            source_id: "outcome-history".to_string(),
            source_site: Some(defaults.source_site.clone()),
            edital_number: Some(self.edital_id.clone()),
            object: Some(self.object.clone()),
            category_label: Some(self.category.clone()),
            bidding_type: self.bidding_type.clone(),
            modality: Some(defaults.modality.clone()),
            issuing_body: Some(defaults.issuing_body.clone()),
            contracted_value: self.contracted_value,
            proposal_count: self.proposal_count,
            result_date: self.result_date.clone(),
            judgment_criterion: Some(defaults.judgment_criterion.clone()),
            success_factors: self.merged_success_factors(),
            ..RecordDraft::default()
        };
        draft.normalize()
    }

    /// Overlays this outcome onto a scraped record describing the same tender.
    ///
    /// Fields the history actually carries override the scraped values; defaulted
    /// fields only fill gaps.
    pub fn apply_to(&self, record: &mut ProcurementRecord, defaults: &LegacyDefaults) {
        if !self.object.trim().is_empty() {
            record.object = self.object.split_whitespace().collect::<Vec<_>>().join(" ");
        }
        if let Some(category) = Category::parse(&self.category) {
            record.category = category;
        }
        if let Some(bidding_type) = non_blank(&self.bidding_type) {
            record.bidding_type = Some(bidding_type);
        }
        if let Some(value) = self.contracted_value.filter(|v| v.is_finite() && *v >= 0.0) {
            record.contracted_value = Some(value);
        }
        if self.proposal_count.is_some() {
            record.proposal_count = self.proposal_count;
        }
        if let Some(date) = non_blank(&self.result_date) {
            record.result_date = Some(date);
        }
        let factors = self.merged_success_factors();
        if !factors.is_empty() {
            record.success_factors = factors;
        }

        record.modality.get_or_insert_with(|| defaults.modality.clone());
        record
            .issuing_body
            .get_or_insert_with(|| defaults.issuing_body.clone());
        record
            .judgment_criterion
            .get_or_insert_with(|| defaults.judgment_criterion.clone());
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
