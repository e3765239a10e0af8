use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tenderkb_core::RecordDraft;

use crate::parse::{parse_br_date, parse_brl_amount, parse_count};
use crate::{resolve_link, AdapterError, FetchedPage, ListingFormat, ListingPage, SourceAdapter};

/// Government open-data procurement API. Pages are either `{"data": [...], "next": url}`
/// or a bare array of records.
#[derive(Debug, Clone, Copy, Default)]
pub struct DadosAbertosAdapter;

#[async_trait]
impl SourceAdapter for DadosAbertosAdapter {
    fn source_id(&self) -> &'static str {
        "dados-abertos"
    }

    fn display_name(&self) -> &'static str {
        "Dados Abertos Compras"
    }

    fn format(&self) -> ListingFormat {
        ListingFormat::Json
    }

    fn parse_listing(&self, page: &FetchedPage) -> Result<ListingPage, AdapterError> {
        let root: JsonValue = serde_json::from_slice(&page.body).map_err(|source| AdapterError::Json {
            url: page.url.clone(),
            source,
        })?;

        let (items, next) = match &root {
            JsonValue::Array(items) => (items.as_slice(), None),
            JsonValue::Object(_) => {
                let items = root
                    .get("data")
                    .or_else(|| root.get("resultado"))
                    .and_then(JsonValue::as_array)
                    .ok_or_else(|| AdapterError::Markup {
                        url: page.url.clone(),
                        reason: "listing object has no `data` array".to_string(),
                    })?;
                let next = json_str(&root, &["next"]).or_else(|| json_str(&root, &["links", "next"]));
                (items.as_slice(), next)
            }
            _ => {
                return Err(AdapterError::Markup {
                    url: page.url.clone(),
                    reason: "listing is neither an array nor an object".to_string(),
                })
            }
        };

        let drafts = items
            .iter()
            .filter(|item| item.is_object())
            .map(|item| self.draft_from_item(item, page))
            .collect();
        Ok(ListingPage {
            drafts,
            next_page: next.map(|href| resolve_link(&page.url, href)),
        })
    }
}

impl DadosAbertosAdapter {
    fn draft_from_item(&self, item: &JsonValue, page: &FetchedPage) -> RecordDraft {
        let text = |keys: &[&str]| first_text(item, keys);
        RecordDraft {
            source_site: Some(self.display_name().to_string()),
            source_url: text(&["url", "link", "url_edital"]),
            edital_number: text(&["numero_edital", "numero", "identificador"]),
            object: text(&["objeto", "descricao_objeto", "descricao"]),
            category_label: text(&["categoria"]),
            bidding_type: text(&["tipo_licitacao", "tipo"]),
            modality: text(&["modalidade", "modalidade_nome"]),
            issuing_body: text(&["orgao", "orgao_nome", "unidade_gestora"]),
            estimated_value: first_amount(item, &["valor_estimado", "valor_total_estimado"]),
            contracted_value: first_amount(item, &["valor_contratado", "valor_homologado"]),
            proposal_count: first_count(item, &["numero_propostas", "quantidade_propostas"]),
            opening_date: text(&["data_abertura", "data_abertura_proposta"])
                .map(|d| parse_br_date(&d).unwrap_or(d)),
            result_date: text(&["data_resultado", "data_homologacao"])
                .map(|d| parse_br_date(&d).unwrap_or(d)),
            technical_specs: json_string_vec(item, &["especificacoes_tecnicas"])
                .or_else(|| json_string_vec(item, &["especificacoes"]))
                .unwrap_or_default(),
            judgment_criterion: text(&["criterio_julgamento"]),
            execution_term_days: first_count(item, &["prazo_execucao", "prazo_execucao_dias"]),
            success_factors: json_string_vec(item, &["fatores_sucesso"]).unwrap_or_default(),
            notes: text(&["observacoes"]),
            fetched_at: Some(page.fetched_at),
            ..RecordDraft::new(self.source_id())
        }
    }
}

fn json_str<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a str> {
    let mut cur = value;
    for segment in path {
        cur = cur.get(*segment)?;
    }
    cur.as_str()
}

fn json_string_vec(value: &JsonValue, path: &[&str]) -> Option<Vec<String>> {
    let mut cur = value;
    for segment in path {
        cur = cur.get(*segment)?;
    }
    let vals = cur
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str().map(ToString::to_string))
        .collect::<Vec<_>>();
    if vals.is_empty() {
        None
    } else {
        Some(vals)
    }
}

/// First key present as a string (numbers are rendered as text).
fn first_text(item: &JsonValue, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match item.get(*key)? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Numeric fields arrive either as JSON numbers or as pt-BR formatted strings.
fn first_amount(item: &JsonValue, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match item.get(*key)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => parse_brl_amount(s),
        _ => None,
    })
}

fn first_count(item: &JsonValue, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|key| match item.get(*key)? {
        JsonValue::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        JsonValue::String(s) => parse_count(s),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn page(body: &str) -> FetchedPage {
        FetchedPage {
            url: "https://dados.example/api/licitacoes?pagina=1".to_string(),
            content_type: "application/json".to_string(),
            body: body.as_bytes().to_vec(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn bare_arrays_have_no_next_page() {
        let parsed = DadosAbertosAdapter
            .parse_listing(&page(r#"[{"numero": 12, "objeto": "Aquisição de combustível", "valor_estimado": "R$ 9.900,00"}]"#))
            .unwrap();
        assert_eq!(parsed.drafts.len(), 1);
        assert_eq!(parsed.drafts[0].edital_number.as_deref(), Some("12"));
        assert_eq!(parsed.drafts[0].estimated_value, Some(9_900.0));
        assert!(parsed.next_page.is_none());
    }

    #[test]
    fn envelope_next_link_resolves_against_the_page() {
        let parsed = DadosAbertosAdapter
            .parse_listing(&page(r#"{"data": [], "next": "licitacoes?pagina=2"}"#))
            .unwrap();
        assert!(parsed.drafts.is_empty());
        assert_eq!(
            parsed.next_page.as_deref(),
            Some("https://dados.example/api/licitacoes?pagina=2")
        );
    }

    #[test]
    fn malformed_payloads_are_adapter_errors() {
        assert!(matches!(
            DadosAbertosAdapter.parse_listing(&page("<html>")),
            Err(AdapterError::Json { .. })
        ));
        assert!(matches!(
            DadosAbertosAdapter.parse_listing(&page(r#"{"items": []}"#)),
            Err(AdapterError::Markup { .. })
        ));
    }
}
