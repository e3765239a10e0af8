use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("unknown procurement category: {0}")]
    UnknownCategory(String),
    #[error("record from {source_id} has no object description")]
    MissingObject { source_id: String },
    #[error("record from {source_id} has neither a source URL nor an edital number")]
    MissingIdentity { source_id: String },
}

/// Procurement category. Serialized with the labels used by the procurement portals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Category {
    #[serde(rename = "bens")]
    Goods,
    #[serde(rename = "servicos")]
    Services,
    #[serde(rename = "obras")]
    Works,
}

const SERVICE_WORDS: &[&str] = &["servico", "manutencao", "limpeza", "seguranca"];
const GOODS_WORDS: &[&str] = &["equipamento", "material", "movel", "moveis", "veiculo"];
const WORKS_WORDS: &[&str] = &["obra", "construcao", "reforma"];

impl Category {
    pub const ALL: [Category; 3] = [Category::Goods, Category::Services, Category::Works];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Goods => "bens",
            Category::Services => "servicos",
            Category::Works => "obras",
        }
    }

    /// Parses an explicit category label, Portuguese or English, accents tolerated.
    pub fn parse(label: &str) -> Option<Self> {
        match fold_accents(label.trim()).to_lowercase().as_str() {
            "bens" | "bem" | "goods" | "good" => Some(Category::Goods),
            "servicos" | "servico" | "services" | "service" => Some(Category::Services),
            "obras" | "obra" | "works" | "work" => Some(Category::Works),
            _ => None,
        }
    }

    /// Keyword classification of free text. `None` when no keyword matches.
    pub fn classify_strict(text: &str) -> Option<Self> {
        let folded = fold_accents(text).to_lowercase();
        if SERVICE_WORDS.iter().any(|w| folded.contains(w)) {
            Some(Category::Services)
        } else if GOODS_WORDS.iter().any(|w| folded.contains(w)) {
            Some(Category::Goods)
        } else if WORKS_WORDS.iter().any(|w| folded.contains(w)) {
            Some(Category::Works)
        } else {
            None
        }
    }

    /// Keyword classification that falls back to services, the most common bucket.
    pub fn classify(text: &str) -> Self {
        Self::classify_strict(text).unwrap_or(Category::Services)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Category {
    type Error = NormalizeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Category::parse(&value).ok_or(NormalizeError::UnknownCategory(value))
    }
}

/// A past competitive purchasing process, immutable once stored.
///
/// Field aliases accept the Portuguese keys written by earlier collectors so old
/// partitions stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcurementRecord {
    #[serde(alias = "numero_edital", default)]
    pub edital_number: String,
    #[serde(alias = "objeto")]
    pub object: String,
    #[serde(alias = "categoria")]
    pub category: Category,
    #[serde(alias = "tipo_licitacao", default)]
    pub bidding_type: Option<String>,
    #[serde(alias = "modalidade", default)]
    pub modality: Option<String>,
    #[serde(alias = "orgao", default)]
    pub issuing_body: Option<String>,
    #[serde(alias = "valor_estimado", default)]
    pub estimated_value: Option<f64>,
    #[serde(alias = "valor_contratado", default)]
    pub contracted_value: Option<f64>,
    #[serde(alias = "numero_propostas", default)]
    pub proposal_count: Option<u32>,
    #[serde(alias = "data_abertura", default)]
    pub opening_date: Option<String>,
    #[serde(alias = "data_resultado", default)]
    pub result_date: Option<String>,
    #[serde(alias = "especificacoes_tecnicas", default)]
    pub technical_specs: Vec<String>,
    #[serde(alias = "criterio_julgamento", default)]
    pub judgment_criterion: Option<String>,
    #[serde(alias = "prazo_execucao", default)]
    pub execution_term_days: Option<u32>,
    #[serde(alias = "fatores_sucesso", default)]
    pub success_factors: Vec<String>,
    #[serde(alias = "observacoes", default)]
    pub notes: Option<String>,
    #[serde(alias = "url_fonte", default)]
    pub source_url: Option<String>,
    #[serde(alias = "site_origem", default)]
    pub source_site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
}

impl ProcurementRecord {
    /// Minimal record; every optional attribute starts absent.
    pub fn new(edital_number: impl Into<String>, object: impl Into<String>, category: Category) -> Self {
        Self {
            edital_number: edital_number.into(),
            object: object.into(),
            category,
            bidding_type: None,
            modality: None,
            issuing_body: None,
            estimated_value: None,
            contracted_value: None,
            proposal_count: None,
            opening_date: None,
            result_date: None,
            technical_specs: Vec::new(),
            judgment_criterion: None,
            execution_term_days: None,
            success_factors: Vec::new(),
            notes: None,
            source_url: None,
            source_site: None,
            collected_at: None,
        }
    }

    /// Value used for reference-price statistics: contracted when known, else estimated.
    pub fn reference_value(&self) -> Option<f64> {
        self.contracted_value.or(self.estimated_value)
    }

    /// Re-applies the ingestion-boundary cleanup to a record read back from disk.
    pub fn sanitized(mut self) -> Self {
        self.edital_number = clean_text(Some(self.edital_number)).unwrap_or_default();
        self.object = clean_text(Some(self.object)).unwrap_or_default();
        self.bidding_type = clean_text(self.bidding_type);
        self.modality = clean_text(self.modality);
        self.issuing_body = clean_text(self.issuing_body);
        self.estimated_value = clean_amount(self.estimated_value);
        self.contracted_value = clean_amount(self.contracted_value);
        self.opening_date = clean_text(self.opening_date);
        self.result_date = clean_text(self.result_date);
        self.technical_specs = clean_list(self.technical_specs);
        self.judgment_criterion = clean_text(self.judgment_criterion);
        self.success_factors = clean_list(self.success_factors);
        self.notes = clean_text(self.notes);
        self.source_url = clean_text(self.source_url);
        self.source_site = clean_text(self.source_site);
        self
    }
}

/// Loosely-typed handoff shape produced by source adapters. Validated exactly once by
/// [`RecordDraft::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub source_id: String,
    pub source_site: Option<String>,
    pub source_url: Option<String>,
    pub edital_number: Option<String>,
    pub object: Option<String>,
    pub category_label: Option<String>,
    /// Search keyword that surfaced the record; last-resort category signal.
    pub category_hint: Option<String>,
    pub bidding_type: Option<String>,
    pub modality: Option<String>,
    pub issuing_body: Option<String>,
    pub estimated_value: Option<f64>,
    pub contracted_value: Option<f64>,
    pub proposal_count: Option<u32>,
    pub opening_date: Option<String>,
    pub result_date: Option<String>,
    pub technical_specs: Vec<String>,
    pub judgment_criterion: Option<String>,
    pub execution_term_days: Option<u32>,
    pub success_factors: Vec<String>,
    pub notes: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl RecordDraft {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ..Default::default()
        }
    }

    pub fn normalize(self) -> Result<ProcurementRecord, NormalizeError> {
        let object = clean_text(self.object).ok_or_else(|| NormalizeError::MissingObject {
            source_id: self.source_id.clone(),
        })?;
        let source_url = clean_text(self.source_url);
        let edital_number = clean_text(self.edital_number);
        if source_url.is_none() && edital_number.is_none() {
            return Err(NormalizeError::MissingIdentity {
                source_id: self.source_id,
            });
        }

        let category = self
            .category_label
            .as_deref()
            .and_then(Category::parse)
            .or_else(|| Category::classify_strict(&object))
            .or_else(|| self.category_hint.as_deref().and_then(Category::classify_strict))
            .unwrap_or(Category::Services);

        Ok(ProcurementRecord {
            edital_number: edital_number.unwrap_or_default(),
            object,
            category,
            bidding_type: clean_text(self.bidding_type),
            modality: clean_text(self.modality),
            issuing_body: clean_text(self.issuing_body),
            estimated_value: clean_amount(self.estimated_value),
            contracted_value: clean_amount(self.contracted_value),
            proposal_count: self.proposal_count,
            opening_date: clean_text(self.opening_date),
            result_date: clean_text(self.result_date),
            technical_specs: clean_list(self.technical_specs),
            judgment_criterion: clean_text(self.judgment_criterion),
            execution_term_days: self.execution_term_days,
            success_factors: clean_list(self.success_factors),
            notes: clean_text(self.notes),
            source_url,
            source_site: clean_text(self.source_site),
            collected_at: self.fetched_at,
        })
    }
}

/// Strips diacritics so keyword and label comparisons survive accent drift,
/// whether the input arrives precomposed or decomposed.
pub fn fold_accents(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Merge key for edital numbers: lowercase alphanumerics only. `None` for blank numbers.
pub fn edital_key(edital_number: &str) -> Option<String> {
    let key = edital_number
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect::<String>();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    let value = value?;
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values.into_iter().filter_map(|v| clean_text(Some(v))).collect()
}

// Negative or non-finite amounts are malformed; zero is a real value.
fn clean_amount(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}
