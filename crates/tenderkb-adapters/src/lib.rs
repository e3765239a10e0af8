//! Source adapter contracts and the portal-specific listing parsers.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tenderkb_core::{ProcurementRecord, RecordDraft};
use tenderkb_storage::{FetchError, HttpFetcher};
use thiserror::Error;
use uuid::Uuid;

mod html;
mod json;
mod parse;

pub use html::{ComprasnetAdapter, CorreiosAdapter};
pub use json::DadosAbertosAdapter;
pub use parse::{
    derive_record_id, parse_br_date, parse_brl_amount, parse_count, record_identifier, DraftField,
};

pub const CRATE_NAME: &str = "tenderkb-adapters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingFormat {
    Html,
    Json,
}

impl ListingFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ListingFormat::Html => "html",
            ListingFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPage {
    /// URL of the page, or the fixture path it was read from.
    pub url: String,
    pub content_type: String,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterContext {
    pub run_id: Uuid,
    pub fetched_at: DateTime<Utc>,
}

/// One listing to walk, optionally scoped to a search keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingTarget {
    pub url: String,
    pub keyword: Option<String>,
}

/// What one listing page yielded: the drafts on it and where the next page lives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub drafts: Vec<RecordDraft>,
    pub next_page: Option<String>,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("markup mismatch on {url}: {reason}")]
    Markup { url: String, reason: String },
    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },
    #[error("unparseable listing json from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &'static str;
    fn display_name(&self) -> &'static str;
    fn format(&self) -> ListingFormat;

    /// Expands configured listing URLs into targets. With a `keyword_param`
    /// every URL is searched once per keyword; without one each URL is walked once.
    fn listing_targets(
        &self,
        listing_urls: &[String],
        keyword_param: Option<&str>,
        keywords: &[String],
    ) -> Vec<ListingTarget> {
        match keyword_param {
            Some(param) if !keywords.is_empty() => listing_urls
                .iter()
                .flat_map(|url| {
                    keywords.iter().map(move |keyword| ListingTarget {
                        url: with_query_param(url, param, keyword),
                        keyword: Some(keyword.clone()),
                    })
                })
                .collect(),
            _ => listing_urls
                .iter()
                .map(|url| ListingTarget {
                    url: url.clone(),
                    keyword: None,
                })
                .collect(),
        }
    }

    async fn fetch_listing(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
        url: &str,
    ) -> Result<FetchedPage, AdapterError> {
        let response = http.fetch_bytes(ctx.run_id, self.source_id(), url).await?;
        Ok(FetchedPage {
            url: response.final_url,
            content_type: response
                .content_type
                .unwrap_or_else(|| default_content_type(self.format()).to_string()),
            body: response.body,
            fetched_at: ctx.fetched_at,
        })
    }

    fn parse_listing(&self, page: &FetchedPage) -> Result<ListingPage, AdapterError>;
}

pub fn adapter_for_source(source_id: &str) -> Option<Box<dyn SourceAdapter>> {
    match source_id {
        "correios-editais" => Some(Box::new(CorreiosAdapter)),
        "comprasnet" => Some(Box::new(ComprasnetAdapter)),
        "dados-abertos" => Some(Box::new(DadosAbertosAdapter)),
        _ => None,
    }
}

/// Reads a listing page captured on disk, stamping it the way a live fetch would.
pub async fn load_fixture_page(
    path: impl AsRef<Path>,
    format: ListingFormat,
    fetched_at: DateTime<Utc>,
) -> anyhow::Result<FetchedPage> {
    let path = path.as_ref();
    let body = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading fixture page {}", path.display()))?;
    Ok(FetchedPage {
        url: path.display().to_string(),
        content_type: default_content_type(format).to_string(),
        body,
        fetched_at,
    })
}

/// Resolves a pagination link against the page it was found on. Fixture pages
/// resolve relative to their file.
pub fn resolve_link(base: &str, href: &str) -> String {
    if let Ok(absolute) = Url::parse(href) {
        return absolute.to_string();
    }
    if let Ok(base_url) = Url::parse(base) {
        if let Ok(joined) = base_url.join(href) {
            return joined.to_string();
        }
    }
    let parent = Path::new(base).parent().unwrap_or_else(|| Path::new(""));
    let relative = href.split(['?', '#']).next().unwrap_or(href);
    PathBuf::from(parent).join(relative).display().to_string()
}

/// Identifier plus normalized record, or the reason the draft was refused.
pub fn finalize_draft(
    source_id: &str,
    draft: RecordDraft,
) -> Result<(String, ProcurementRecord), tenderkb_core::NormalizeError> {
    let record = draft.normalize()?;
    let id = record_identifier(source_id, &record);
    Ok((id, record))
}

fn default_content_type(format: ListingFormat) -> &'static str {
    match format {
        ListingFormat::Html => "text/html",
        ListingFormat::Json => "application/json",
    }
}

fn with_query_param(url: &str, param: &str, value: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().append_pair(param, value);
            parsed.to_string()
        }
        Err(_) => {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{url}{sep}{param}={}", value.replace(' ', "+"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_param_fans_out_one_target_per_keyword() {
        let adapter = DadosAbertosAdapter;
        let targets = adapter.listing_targets(
            &["https://dados.gov.br/api/licitacoes?uf=DF".to_string()],
            Some("q"),
            &["limpeza".to_string(), "material de escritório".to_string()],
        );
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].keyword.as_deref(), Some("limpeza"));
        assert!(targets[0].url.contains("uf=DF"));
        assert!(targets[0].url.ends_with("q=limpeza"));
        assert!(targets[1].url.contains("q=material+de+escrit"));
    }

    #[test]
    fn without_keyword_param_each_url_is_walked_once() {
        let adapter = CorreiosAdapter;
        let targets = adapter.listing_targets(
            &["https://a.example/lista".to_string(), "https://b.example/lista".to_string()],
            None,
            &["limpeza".to_string()],
        );
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.keyword.is_none()));
    }

    #[test]
    fn links_resolve_against_urls_and_fixture_paths() {
        assert_eq!(
            resolve_link("https://portal.example/editais/lista?p=1", "lista?p=2"),
            "https://portal.example/editais/lista?p=2"
        );
        assert_eq!(
            resolve_link("fixtures/correios-editais/page1.html", "page2.html"),
            Path::new("fixtures/correios-editais").join("page2.html").display().to_string()
        );
        assert_eq!(
            resolve_link("fixtures/x/page1.html", "https://other.example/p2"),
            "https://other.example/p2"
        );
    }

    #[test]
    fn unknown_sources_have_no_adapter() {
        assert!(adapter_for_source("comprasnet").is_some());
        assert!(adapter_for_source("portal-desconhecido").is_none());
    }
}
