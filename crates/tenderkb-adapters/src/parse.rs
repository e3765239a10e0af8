use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tenderkb_core::{fold_accents, ProcurementRecord, RecordDraft};

static NUMPRP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[?&]numprp=(\d+)").expect("valid numprp regex"));
static CODUASG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[?&]coduasg=(\d+)").expect("valid coduasg regex"));
static BR_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})").expect("valid date regex"));
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("valid iso date regex"));
static FIRST_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid integer regex"));
static AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d.,]*").expect("valid amount regex"));

/// Stable identifier from a listing URL: `{coduasg}_{numprp}` when both query
/// parameters are present, `{numprp}` alone, otherwise the full URL.
pub fn derive_record_id(url: &str) -> String {
    let numprp = NUMPRP.captures(url).map(|c| c[1].to_string());
    let coduasg = CODUASG.captures(url).map(|c| c[1].to_string());
    match (coduasg, numprp) {
        (Some(uasg), Some(numprp)) => format!("{uasg}_{numprp}"),
        (None, Some(numprp)) => numprp,
        _ => url.to_string(),
    }
}

/// Registry identifier for a normalized record. Records without a URL fall back
/// to the edital number scoped by source.
pub fn record_identifier(source_id: &str, record: &ProcurementRecord) -> String {
    match record.source_url.as_deref() {
        Some(url) => derive_record_id(url),
        None => format!("{source_id}:{}", record.edital_number),
    }
}

/// `R$ 1.234.567,89` → 1234567.89. Plain `1234.5` is accepted too.
pub fn parse_brl_amount(text: &str) -> Option<f64> {
    let raw = AMOUNT.find(text)?.as_str().trim_end_matches(['.', ',']);
    let normalized = if raw.contains(',') {
        raw.replace('.', "").replace(',', ".")
    } else if raw.matches('.').count() > 1
        || raw.rsplit('.').next().is_some_and(|tail| tail.len() == 3 && raw.contains('.'))
    {
        raw.replace('.', "")
    } else {
        raw.to_string()
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `dd/mm/yyyy` (optionally followed by a time) → `yyyy-mm-dd`. ISO dates pass through.
pub fn parse_br_date(text: &str) -> Option<String> {
    let text = text.trim();
    if let Some(caps) = ISO_DATE.captures(text) {
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )?;
        return Some(date.format("%Y-%m-%d").to_string());
    }
    let caps = BR_DATE.captures(text)?;
    let date = NaiveDate::from_ymd_opt(
        caps[3].parse().ok()?,
        caps[2].parse().ok()?,
        caps[1].parse().ok()?,
    )?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// First integer in free text, e.g. `"12 propostas"` → 12.
pub fn parse_count(text: &str) -> Option<u32> {
    FIRST_INT.find(text)?.as_str().parse().ok()
}

/// Draft attribute a portal label maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Object,
    EditalNumber,
    Category,
    BiddingType,
    Modality,
    IssuingBody,
    EstimatedValue,
    ContractedValue,
    ProposalCount,
    OpeningDate,
    ResultDate,
    JudgmentCriterion,
    ExecutionTerm,
    TechnicalSpecs,
    Uasg,
}

impl DraftField {
    /// Maps a portal column or row label (`"Número Edital:"`, `"Valor Estimado"`, ...).
    pub fn from_label(label: &str) -> Option<Self> {
        let label = fold_accents(label.trim().trim_end_matches(':')).to_lowercase();
        let has = |needle: &str| label.contains(needle);
        let field = if has("objeto") {
            DraftField::Object
        } else if has("categoria") {
            DraftField::Category
        } else if has("valor") && (has("contratado") || has("homologado") || has("adjudicado")) {
            DraftField::ContractedValue
        } else if has("valor") {
            DraftField::EstimatedValue
        } else if has("proposta") {
            DraftField::ProposalCount
        } else if has("criterio") || has("julgamento") {
            DraftField::JudgmentCriterion
        } else if has("prazo") {
            DraftField::ExecutionTerm
        } else if has("especifica") {
            DraftField::TechnicalSpecs
        } else if has("modalidade") {
            DraftField::Modality
        } else if has("tipo") {
            DraftField::BiddingType
        } else if has("abertura") {
            DraftField::OpeningDate
        } else if has("resultado") || has("homologa") {
            DraftField::ResultDate
        } else if has("orgao") || has("dependencia") || has("unidade") {
            DraftField::IssuingBody
        } else if has("uasg") {
            DraftField::Uasg
        } else if has("edital") || has("numero") || label == "n" || label.starts_with("n ") {
            DraftField::EditalNumber
        } else {
            return None;
        };
        Some(field)
    }

    /// Stores a raw cell value on the draft, parsing numbers and dates as needed.
    pub fn apply(self, draft: &mut RecordDraft, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        let text = Some(value.to_string());
        match self {
            DraftField::Object => draft.object = text,
            DraftField::EditalNumber => draft.edital_number = text,
            DraftField::Category => draft.category_label = text,
            DraftField::BiddingType => draft.bidding_type = text,
            DraftField::Modality => draft.modality = text,
            DraftField::IssuingBody => draft.issuing_body = text,
            DraftField::EstimatedValue => draft.estimated_value = parse_brl_amount(value),
            DraftField::ContractedValue => draft.contracted_value = parse_brl_amount(value),
            DraftField::ProposalCount => draft.proposal_count = parse_count(value),
            DraftField::OpeningDate => draft.opening_date = parse_br_date(value).or(text),
            DraftField::ResultDate => draft.result_date = parse_br_date(value).or(text),
            DraftField::JudgmentCriterion => draft.judgment_criterion = text,
            DraftField::ExecutionTerm => draft.execution_term_days = parse_count(value),
            DraftField::TechnicalSpecs => draft.technical_specs.extend(
                value
                    .split([';', '\n'])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string),
            ),
            DraftField::Uasg => {
                let note = format!("UASG {value}");
                draft.notes = Some(match draft.notes.take() {
                    Some(existing) => format!("{existing}; {note}"),
                    None => note,
                });
            }
        }
    }
}
