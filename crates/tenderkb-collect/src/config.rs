use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tenderkb_core::fold_accents;
use tokio::fs;

use crate::schedule::CollectFrequency;

/// Priority purchase categories searched when a run names none.
pub const DEFAULT_KEYWORDS: [&str; 10] = [
    "serviços de limpeza",
    "equipamentos de informática",
    "material de escritório",
    "serviços de segurança",
    "serviços de manutenção",
    "veículos",
    "combustível",
    "serviços de telecomunicações",
    "móveis e utensílios",
    "material de construção",
];

#[derive(Debug, Clone, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<SourceConfig>,
}

impl SourceRegistry {
    pub async fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Live,
    /// Listing pages are files relative to the workspace root.
    Fixture,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub source_id: String,
    pub display_name: String,
    pub enabled: bool,
    pub mode: SourceMode,
    #[serde(default)]
    pub listing_urls: Vec<String>,
    #[serde(default)]
    pub keyword_param: Option<String>,
    #[serde(default)]
    pub max_pages: Option<usize>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SourceConfig {
    pub fn matches_site(&self, site: &str) -> bool {
        let site = site.trim();
        self.source_id.eq_ignore_ascii_case(site) || self.display_name.eq_ignore_ascii_case(site)
    }
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub workspace_root: PathBuf,
    pub sources_path: PathBuf,
    pub data_dir: PathBuf,
    pub registry_path: PathBuf,
    pub archive_dir: PathBuf,
    pub archive_raw: bool,
    pub reports_dir: PathBuf,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub step_timeout_secs: u64,
    pub max_pages: usize,
    pub cache_ttl_secs: u64,
    pub schedule: CollectFrequency,
}

impl CollectorConfig {
    /// Defaults laid out under one workspace root.
    pub fn for_workspace(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let data_dir = root.join("data");
        Self {
            sources_path: root.join("sources.yaml"),
            registry_path: data_dir.join("processed_register.json"),
            archive_dir: data_dir.join("raw"),
            reports_dir: root.join("reports"),
            data_dir,
            archive_raw: true,
            user_agent: "tenderkb-collector/0.1".to_string(),
            http_timeout_secs: 20,
            step_timeout_secs: 300,
            max_pages: 10,
            cache_ttl_secs: 300,
            schedule: CollectFrequency::Semanal,
            workspace_root: root,
        }
    }

    pub fn from_env() -> Self {
        let root = std::env::var("TENDERKB_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        let mut config = Self::for_workspace(root);

        if let Ok(dir) = std::env::var("TENDERKB_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
            config.registry_path = config.data_dir.join("processed_register.json");
            config.archive_dir = config.data_dir.join("raw");
        }
        if let Ok(path) = std::env::var("TENDERKB_REGISTRY_PATH") {
            config.registry_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("TENDERKB_ARCHIVE_DIR") {
            config.archive_dir = PathBuf::from(dir);
        }
        if let Ok(v) = std::env::var("TENDERKB_ARCHIVE_RAW") {
            config.archive_raw = matches!(v.as_str(), "1" | "true" | "TRUE" | "True");
        }
        if let Ok(ua) = std::env::var("TENDERKB_USER_AGENT") {
            config.user_agent = ua;
        }
        config.http_timeout_secs = env_number("TENDERKB_HTTP_TIMEOUT_SECS").unwrap_or(20);
        config.step_timeout_secs = env_number("TENDERKB_STEP_TIMEOUT_SECS").unwrap_or(300);
        config.max_pages = env_number("TENDERKB_MAX_PAGES").unwrap_or(10);
        config.cache_ttl_secs = env_number("TENDERKB_CACHE_TTL_SECS").unwrap_or(300);
        if let Some(frequency) = std::env::var("TENDERKB_SCHEDULE")
            .ok()
            .and_then(|v| CollectFrequency::parse(&v))
        {
            config.schedule = frequency;
        }
        config
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// What one collection run looks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectRequest {
    pub keywords: Vec<String>,
    /// Restricts the run to these sources (by id or display name).
    #[serde(default)]
    pub site_allowlist: Option<Vec<String>>,
}

impl Default for CollectRequest {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            site_allowlist: None,
        }
    }
}

impl CollectRequest {
    pub fn with_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            site_allowlist: None,
        }
    }

    pub fn with_sites<I, S>(mut self, sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.site_allowlist = Some(sites.into_iter().map(Into::into).collect());
        self
    }

    pub fn allows(&self, source: &SourceConfig) -> bool {
        match &self.site_allowlist {
            Some(sites) => sites.iter().any(|site| source.matches_site(site)),
            None => true,
        }
    }

    /// Case- and accent-insensitive containment; an empty keyword set keeps everything.
    pub fn matches_text(&self, text: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let haystack = fold_accents(text).to_lowercase();
        self.keywords
            .iter()
            .map(|k| fold_accents(k.trim()).to_lowercase())
            .filter(|k| !k.is_empty())
            .any(|k| haystack.contains(&k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str, name: &str) -> SourceConfig {
        SourceConfig {
            source_id: id.to_string(),
            display_name: name.to_string(),
            enabled: true,
            mode: SourceMode::Fixture,
            listing_urls: Vec::new(),
            keyword_param: None,
            max_pages: None,
            notes: None,
        }
    }

    #[test]
    fn allowlist_matches_id_or_display_name() {
        let request = CollectRequest::default().with_sites(["ComprasNet"]);
        assert!(request.allows(&source("comprasnet", "ComprasNet")));
        assert!(!request.allows(&source("correios-editais", "Correios Licitações")));

        let by_id = CollectRequest::default().with_sites(["CORREIOS-EDITAIS"]);
        assert!(by_id.allows(&source("correios-editais", "Correios Licitações")));
    }

    #[test]
    fn keyword_matching_ignores_case_and_accents() {
        let request = CollectRequest::with_keywords(["serviços de limpeza"]);
        assert!(request.matches_text("CONTRATAÇÃO DE SERVICOS DE LIMPEZA PREDIAL"));
        assert!(!request.matches_text("Locação de espaço comercial"));
        assert!(CollectRequest::with_keywords(Vec::<String>::new()).matches_text("qualquer"));
    }

    #[test]
    fn default_request_carries_the_ten_priority_categories() {
        assert_eq!(CollectRequest::default().keywords.len(), 10);
    }

    #[test]
    fn source_registry_yaml_parses() {
        let yaml = r#"
sources:
  - source_id: dados-abertos
    display_name: Dados Abertos Compras
    enabled: true
    mode: live
    listing_urls: ["https://dados.example/api/licitacoes"]
    keyword_param: q
    max_pages: 3
"#;
        let registry: SourceRegistry = serde_yaml::from_str(yaml).unwrap();
        let src = &registry.sources[0];
        assert_eq!(src.mode, SourceMode::Live);
        assert_eq!(src.keyword_param.as_deref(), Some("q"));
        assert_eq!(src.max_pages, Some(3));
    }
}
