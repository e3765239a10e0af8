//! Collection run orchestration: fan out over source adapters, normalize and
//! deduplicate against the identifier registry, persist one corpus partition.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tenderkb_adapters::{
    adapter_for_source, finalize_draft, load_fixture_page, AdapterContext, AdapterError,
    FetchedPage, SourceAdapter,
};
use tenderkb_core::{ProcurementRecord, RecordDraft};
use tenderkb_storage::{
    CorpusStore, HttpClientConfig, HttpFetcher, IdentifierRegistry, RawPageArchive,
};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

mod config;
mod report;
mod schedule;

pub use config::{
    CollectRequest, CollectorConfig, SourceConfig, SourceMode, SourceRegistry, DEFAULT_KEYWORDS,
};
pub use report::{render_brief, write_reports};
pub use schedule::{build_scheduler, CollectFrequency};

pub const CRATE_NAME: &str = "tenderkb-collect";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Failed,
    TimedOut,
}

impl SourceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceStatus::Ok => "ok",
            SourceStatus::Failed => "failed",
            SourceStatus::TimedOut => "timed_out",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source_id: String,
    pub display_name: String,
    pub status: SourceStatus,
    pub pages: usize,
    /// Drafts parsed from every fetched page.
    pub drafts: usize,
    /// Drafts left after keyword filtering.
    pub kept: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub keywords: Vec<String>,
    pub sources: Vec<SourceReport>,
    pub new_records: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub partition_path: Option<String>,
    pub reports_dir: String,
}

/// A finished run: its summary plus the records that were new to the registry.
#[derive(Debug, Clone)]
pub struct CollectRun {
    pub summary: CollectSummary,
    pub records: Vec<ProcurementRecord>,
}

struct SourceHarvest {
    report: SourceReport,
    drafts: Vec<RecordDraft>,
}

pub struct Collector {
    config: CollectorConfig,
    http: HttpFetcher,
    archive: RawPageArchive,
    corpus: CorpusStore,
}

impl Collector {
    pub fn new(config: CollectorConfig) -> Result<Self> {
        let http = HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: Some(config.user_agent.clone()),
            ..Default::default()
        })
        .context("building http client")?;
        Ok(Self {
            archive: RawPageArchive::new(config.archive_dir.clone()),
            corpus: CorpusStore::new(config.data_dir.clone()),
            http,
            config,
        })
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub async fn run_once(&self, request: &CollectRequest) -> Result<CollectRun> {
        let run_id = Uuid::new_v4();
        let span = info_span!("collect_run", %run_id);
        self.run_inner(run_id, request).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, request: &CollectRequest) -> Result<CollectRun> {
        let started_at = Utc::now();
        let sources = SourceRegistry::load(&self.config.sources_path).await?;
        let selected: Vec<SourceConfig> = sources
            .sources
            .into_iter()
            .filter(|s| s.enabled && request.allows(s))
            .collect();

        // Refuse to run on top of an unreadable registry before any fetching.
        let mut registry = IdentifierRegistry::load(&self.config.registry_path)
            .await
            .with_context(|| format!("loading registry {}", self.config.registry_path.display()))?;

        let ctx = AdapterContext {
            run_id,
            fetched_at: started_at,
        };
        let harvests = join_all(
            selected
                .iter()
                .map(|source| self.harvest_source(&ctx, source, request)),
        )
        .await;

        // Single writer: the registry is only touched here, after every adapter finished.
        let mut seen_this_run: HashSet<String> = HashSet::new();
        let mut records = Vec::new();
        let mut duplicates = 0usize;
        let mut rejected = 0usize;
        let mut reports = Vec::with_capacity(harvests.len());
        for harvest in harvests {
            let source_id = harvest.report.source_id.clone();
            for draft in harvest.drafts {
                let (id, record) = match finalize_draft(&source_id, draft) {
                    Ok(finalized) => finalized,
                    Err(err) => {
                        debug!(source_id = %source_id, error = %err, "rejected draft");
                        rejected += 1;
                        continue;
                    }
                };
                if registry.contains(&id) || !seen_this_run.insert(id.clone()) {
                    duplicates += 1;
                    continue;
                }
                registry.insert(id);
                records.push(record);
            }
            reports.push(harvest.report);
        }

        let partition_path = self
            .corpus
            .write_partition(started_at, &records)
            .await
            .context("writing corpus partition")?;
        if registry.is_dirty() {
            registry
                .persist()
                .await
                .with_context(|| format!("persisting registry {}", registry.path().display()))?;
        }

        if records.is_empty() {
            info!("collection finished with no new records");
        }
        info!(
            new_records = records.len(),
            duplicates,
            rejected,
            sources = reports.len(),
            "collection run finished"
        );

        let summary = CollectSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            keywords: request.keywords.clone(),
            sources: reports,
            new_records: records.len(),
            duplicates,
            rejected,
            partition_path: partition_path.map(|p| p.display().to_string()),
            reports_dir: self
                .config
                .reports_dir
                .join(run_id.to_string())
                .display()
                .to_string(),
        };
        write_reports(&self.config.reports_dir, &summary, &records).await?;

        Ok(CollectRun { summary, records })
    }

    /// Walks every listing target of one source until the pages run out, the page
    /// cap is hit, an error occurs, or the step deadline passes. Whatever was parsed
    /// before a failure or timeout is kept.
    async fn harvest_source(
        &self,
        ctx: &AdapterContext,
        source: &SourceConfig,
        request: &CollectRequest,
    ) -> SourceHarvest {
        let mut report = SourceReport {
            source_id: source.source_id.clone(),
            display_name: source.display_name.clone(),
            status: SourceStatus::Ok,
            pages: 0,
            drafts: 0,
            kept: 0,
            error: None,
        };
        let mut drafts = Vec::new();

        let Some(adapter) = adapter_for_source(&source.source_id) else {
            warn!(source_id = %source.source_id, "no adapter registered");
            report.status = SourceStatus::Failed;
            report.error = Some(format!("no adapter registered for {}", source.source_id));
            return SourceHarvest { report, drafts };
        };

        let deadline = Instant::now() + Duration::from_secs(self.config.step_timeout_secs);
        let max_pages = source.max_pages.unwrap_or(self.config.max_pages).max(1);
        let targets = adapter.listing_targets(
            &source.listing_urls,
            source.keyword_param.as_deref(),
            &request.keywords,
        );

        'targets: for target in targets {
            let mut location = Some(self.initial_location(source, &target.url));
            let mut pages_for_target = 0usize;
            while let Some(current) = location.take() {
                if pages_for_target >= max_pages {
                    debug!(source_id = %source.source_id, max_pages, "page cap reached");
                    break;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                let loaded = if remaining.is_zero() {
                    None
                } else {
                    timeout(remaining, self.load_page(ctx, source, adapter.as_ref(), &current))
                        .await
                        .ok()
                };
                let Some(loaded) = loaded else {
                    warn!(source_id = %source.source_id, url = %current, "step timeout reached");
                    report.status = SourceStatus::TimedOut;
                    report.error = Some(format!(
                        "step timeout of {}s reached",
                        self.config.step_timeout_secs
                    ));
                    break 'targets;
                };

                let parsed = loaded.and_then(|page| {
                    let parsed = adapter.parse_listing(&page)?;
                    Ok((page, parsed))
                });
                let (page, parsed) = match parsed {
                    Ok(ok) => ok,
                    Err(err) => {
                        warn!(source_id = %source.source_id, url = %current, error = %err, "source adapter failed");
                        report.status = SourceStatus::Failed;
                        report.error = Some(err.to_string());
                        break 'targets;
                    }
                };

                pages_for_target += 1;
                report.pages += 1;
                report.drafts += parsed.drafts.len();
                self.archive_page(source, adapter.as_ref(), &page).await;

                for mut draft in parsed.drafts {
                    if let Some(keyword) = &target.keyword {
                        draft.category_hint = Some(keyword.clone());
                    } else if !request.matches_text(draft.object.as_deref().unwrap_or_default()) {
                        continue;
                    }
                    drafts.push(draft);
                }
                location = parsed.next_page;
            }
        }

        report.kept = drafts.len();
        info!(
            source_id = %source.source_id,
            status = report.status.as_str(),
            pages = report.pages,
            drafts = report.drafts,
            kept = report.kept,
            "source harvested"
        );
        SourceHarvest { report, drafts }
    }

    fn initial_location(&self, source: &SourceConfig, url: &str) -> String {
        match source.mode {
            SourceMode::Live => url.to_string(),
            SourceMode::Fixture => {
                // Fixture files ignore search parameters; the keyword still tags the drafts.
                let url = url.split('?').next().unwrap_or(url);
                let path = Path::new(url);
                if path.is_absolute() {
                    url.to_string()
                } else {
                    self.config.workspace_root.join(path).display().to_string()
                }
            }
        }
    }

    async fn load_page(
        &self,
        ctx: &AdapterContext,
        source: &SourceConfig,
        adapter: &dyn SourceAdapter,
        location: &str,
    ) -> Result<FetchedPage, AdapterError> {
        match source.mode {
            SourceMode::Live => adapter.fetch_listing(&self.http, ctx, location).await,
            SourceMode::Fixture => Ok(load_fixture_page(location, adapter.format(), ctx.fetched_at).await?),
        }
    }

    async fn archive_page(&self, source: &SourceConfig, adapter: &dyn SourceAdapter, page: &FetchedPage) {
        if !self.config.archive_raw {
            return;
        }
        let stored = self
            .archive
            .store_page(
                page.fetched_at,
                &source.source_id,
                adapter.format().extension(),
                &page.body,
            )
            .await;
        match stored {
            Ok(archived) => debug!(
                path = %archived.relative_path.display(),
                deduplicated = archived.deduplicated,
                "archived raw page"
            ),
            Err(err) => warn!(source_id = %source.source_id, error = %err, "raw page archive failed"),
        }
    }
}

/// Convenience entry point used by the binary.
pub async fn run_collect_once_from_env(request: &CollectRequest) -> Result<CollectRun> {
    let collector = Collector::new(CollectorConfig::from_env())?;
    collector.run_once(request).await
}
