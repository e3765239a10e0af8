use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tenderkb_core::RecordDraft;

use crate::parse::DraftField;
use crate::{resolve_link, AdapterError, FetchedPage, ListingFormat, ListingPage, SourceAdapter};

const CORREIOS_ROWS: &str = "#resultado > div > table > tbody > tr";
const CORREIOS_DETAIL_ROWS: &str = "td table tr";
const CORREIOS_LINK: &str = "b a[href]";
const CORREIOS_NEXT: &str = r#"a.box-navegacao[title="Próxima Página"]"#;

const COMPRASNET_HEADERS: &str = "table.tabela-resultados thead th";
const COMPRASNET_ROWS: &str = "table.tabela-resultados tbody tr";
const COMPRASNET_DETAIL_LINK: &str = r#"a[href*="numprp"]"#;
const ANY_LINK: &str = "a[href]";
const COMPRASNET_NEXT: &str = r#"a[rel="next"], a.proxima"#;

/// Correios tender portal: each result row nests a label/value table
/// (`Objeto:`, `Número Edital:`, `Modalidade:`, ...), paginated with a
/// "Próxima Página" navigation link.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorreiosAdapter;

/// ComprasNet search results: one flat table whose header row names the columns;
/// detail links carry the `coduasg`/`numprp` query parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComprasnetAdapter;

#[async_trait]
impl SourceAdapter for CorreiosAdapter {
    fn source_id(&self) -> &'static str {
        "correios-editais"
    }

    fn display_name(&self) -> &'static str {
        "Correios Licitações"
    }

    fn format(&self) -> ListingFormat {
        ListingFormat::Html
    }

    fn parse_listing(&self, page: &FetchedPage) -> Result<ListingPage, AdapterError> {
        let document = Html::parse_document(&page.text());
        let results = selector("#resultado")?;
        let Some(container) = document.select(&results).next() else {
            return Err(AdapterError::Markup {
                url: page.url.clone(),
                reason: "results container #resultado not found".to_string(),
            });
        };

        let rows = selector(CORREIOS_ROWS)?;
        let detail_rows = selector(CORREIOS_DETAIL_ROWS)?;
        let cells = selector("td")?;
        let link = selector(CORREIOS_LINK)?;

        let mut drafts = Vec::new();
        for row in document.select(&rows) {
            let mut draft = self.new_draft(page);
            let mut saw_detail = false;
            for detail in row.select(&detail_rows) {
                saw_detail = true;
                let values: Vec<String> = detail.select(&cells).map(element_text).collect();
                for pair in values.chunks(2) {
                    if let [label, value] = pair {
                        if let Some(field) = DraftField::from_label(label) {
                            field.apply(&mut draft, value);
                        }
                    }
                }
            }
            if !saw_detail {
                continue;
            }
            draft.source_url = select_first_attr(row, &link, "href")
                .map(|href| resolve_link(&page.url, &href));
            drafts.push(draft);
        }

        let empty_notice = element_text(container)
            .to_lowercase()
            .contains("nenhum resultado");
        if document.select(&rows).next().is_none() && !empty_notice {
            return Err(AdapterError::Markup {
                url: page.url.clone(),
                reason: "no result rows and no empty-result notice".to_string(),
            });
        }

        let next = selector(CORREIOS_NEXT)?;
        let next_page = select_first_attr(document.root_element(), &next, "href")
            .map(|href| resolve_link(&page.url, &href));
        Ok(ListingPage { drafts, next_page })
    }
}

impl CorreiosAdapter {
    fn new_draft(&self, page: &FetchedPage) -> RecordDraft {
        RecordDraft {
            source_site: Some(self.display_name().to_string()),
            issuing_body: Some("Correios".to_string()),
            fetched_at: Some(page.fetched_at),
            ..RecordDraft::new(self.source_id())
        }
    }
}

#[async_trait]
impl SourceAdapter for ComprasnetAdapter {
    fn source_id(&self) -> &'static str {
        "comprasnet"
    }

    fn display_name(&self) -> &'static str {
        "ComprasNet"
    }

    fn format(&self) -> ListingFormat {
        ListingFormat::Html
    }

    fn parse_listing(&self, page: &FetchedPage) -> Result<ListingPage, AdapterError> {
        let document = Html::parse_document(&page.text());
        let headers: Vec<Option<DraftField>> = document
            .select(&selector(COMPRASNET_HEADERS)?)
            .map(|th| DraftField::from_label(&element_text(th)))
            .collect();
        if !headers.contains(&Some(DraftField::Object)) {
            return Err(AdapterError::Markup {
                url: page.url.clone(),
                reason: "results table has no object column".to_string(),
            });
        }

        let cells = selector("td")?;
        let detail_link = selector(COMPRASNET_DETAIL_LINK)?;
        let any_link = selector(ANY_LINK)?;
        let mut drafts = Vec::new();
        for row in document.select(&selector(COMPRASNET_ROWS)?) {
            let values: Vec<String> = row.select(&cells).map(element_text).collect();
            if values.is_empty() {
                continue;
            }
            let mut draft = RecordDraft {
                source_site: Some(self.display_name().to_string()),
                fetched_at: Some(page.fetched_at),
                ..RecordDraft::new(self.source_id())
            };
            for (field, value) in headers.iter().zip(&values) {
                if let Some(field) = field {
                    field.apply(&mut draft, value);
                }
            }
            draft.source_url = select_first_attr(row, &detail_link, "href")
                .or_else(|| select_first_attr(row, &any_link, "href"))
                .map(|href| resolve_link(&page.url, &href));
            drafts.push(draft);
        }

        let next_page = select_first_attr(document.root_element(), &selector(COMPRASNET_NEXT)?, "href")
            .map(|href| resolve_link(&page.url, &href));
        Ok(ListingPage { drafts, next_page })
    }
}

fn selector(css: &str) -> Result<Selector, AdapterError> {
    Selector::parse(css).map_err(|e| AdapterError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

fn text_or_none(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn select_first_attr(scope: ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    scope
        .select(sel)
        .next()
        .and_then(|n| n.value().attr(attr))
        .and_then(text_or_none)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn page(url: &str, html: &str) -> FetchedPage {
        FetchedPage {
            url: url.to_string(),
            content_type: "text/html".to_string(),
            body: html.as_bytes().to_vec(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn correios_empty_result_notice_is_not_an_error() {
        let html = r#"<html><body><div id="resultado">Nenhum resultado encontrado.</div></body></html>"#;
        let parsed = CorreiosAdapter
            .parse_listing(&page("https://portal.example/lista", html))
            .unwrap();
        assert!(parsed.drafts.is_empty());
        assert!(parsed.next_page.is_none());
    }

    #[test]
    fn correios_missing_container_is_a_markup_mismatch() {
        let html = "<html><body><p>Manutenção programada</p></body></html>";
        let err = CorreiosAdapter
            .parse_listing(&page("https://portal.example/lista", html))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Markup { .. }));
    }

    #[test]
    fn comprasnet_maps_columns_by_header() {
        let html = r#"<table class="tabela-resultados">
            <thead><tr><th>Nº Edital</th><th>Objeto</th><th>Valor Estimado</th></tr></thead>
            <tbody><tr>
              <td>90012/2024</td>
              <td><a href="https://comprasnet.example/edital.asp?coduasg=160001&amp;numprp=900122024">Aquisição de material de escritório</a></td>
              <td>R$ 12.345,60</td>
            </tr></tbody></table>"#;
        let parsed = ComprasnetAdapter
            .parse_listing(&page("https://comprasnet.example/busca", html))
            .unwrap();
        assert_eq!(parsed.drafts.len(), 1);
        let draft = &parsed.drafts[0];
        assert_eq!(draft.edital_number.as_deref(), Some("90012/2024"));
        assert_eq!(draft.object.as_deref(), Some("Aquisição de material de escritório"));
        assert_eq!(draft.estimated_value, Some(12_345.6));
        assert_eq!(
            draft.source_url.as_deref(),
            Some("https://comprasnet.example/edital.asp?coduasg=160001&numprp=900122024")
        );
    }
}
