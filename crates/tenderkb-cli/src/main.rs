use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tenderkb_collect::{build_scheduler, CollectFrequency, CollectRequest, Collector, CollectorConfig};
use tenderkb_core::{Category, MatchQuery, RiskInput};
use tenderkb_insight::{consolidate, KnowledgeBase, DEFAULT_TOP_N};
use tenderkb_storage::CorpusStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tenderkb")]
#[command(about = "Procurement knowledge base: collect past tenders, consult precedents, consolidate risk")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one collection pass over the enabled sources.
    Collect {
        /// Search keyword; repeat for several. Defaults to the priority categories.
        #[arg(long = "keyword")]
        keywords: Vec<String>,
        /// Restrict the run to a source id or display name; repeatable.
        #[arg(long = "site")]
        sites: Vec<String>,
    },
    /// Rank past tenders similar to a new one and derive recommendations.
    Consult {
        #[arg(long, value_parser = parse_category)]
        category: Category,
        #[arg(long)]
        object: Option<String>,
        #[arg(long)]
        bidding_type: Option<String>,
        #[arg(long, default_value_t = DEFAULT_TOP_N)]
        top: usize,
    },
    /// Consolidate legal, technical and financial ratings.
    Risk {
        /// `domain=level`, e.g. `legal=alto`; repeatable.
        #[arg(long = "rating", value_parser = parse_rating)]
        ratings: Vec<(String, String)>,
    },
    /// Corpus totals, per-category profiles and monthly trends.
    Analytics,
    /// Run the collector on a recurring cron until interrupted.
    Schedule {
        #[arg(long, value_parser = parse_frequency)]
        frequency: Option<CollectFrequency>,
        /// Search keyword for every scheduled run; repeatable.
        #[arg(long = "keyword")]
        keywords: Vec<String>,
        /// Restrict scheduled runs to a source id or display name; repeatable.
        #[arg(long = "site")]
        sites: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = CollectorConfig::from_env();

    match cli.command.unwrap_or(Commands::Collect {
        keywords: Vec::new(),
        sites: Vec::new(),
    }) {
        Commands::Collect { keywords, sites } => {
            let request = collect_request(keywords, sites);
            let run = tenderkb_collect::run_collect_once_from_env(&request).await?;
            print_json(&run.summary)?;
        }
        Commands::Consult {
            category,
            object,
            bidding_type,
            top,
        } => {
            let mut query = MatchQuery::new(category);
            query.object = object;
            query.bidding_type = bidding_type;
            let consultation = knowledge_base(&config).consult(&query, top).await?;
            print_json(&consultation)?;
        }
        Commands::Risk { ratings } => {
            let input = ratings
                .into_iter()
                .fold(RiskInput::new(), |input, (domain, level)| input.rate(domain, level));
            print_json(&consolidate(&input))?;
        }
        Commands::Analytics => {
            let analytics = knowledge_base(&config).analytics().await?;
            print_json(&analytics)?;
        }
        Commands::Schedule {
            frequency,
            keywords,
            sites,
        } => {
            let frequency = frequency.unwrap_or(config.schedule);
            let request = collect_request(keywords, sites);
            let collector = Arc::new(Collector::new(config)?);
            let mut scheduler = build_scheduler(collector, request, frequency).await?;
            scheduler.start().await.context("starting scheduler")?;
            info!(
                frequency = %frequency,
                cron = frequency.cron_expression(),
                "collection scheduled; press ctrl-c to stop"
            );
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            scheduler.shutdown().await.context("stopping scheduler")?;
        }
    }

    Ok(())
}

/// Empty keyword lists fall back to the priority categories; empty site lists allow every source.
fn collect_request(keywords: Vec<String>, sites: Vec<String>) -> CollectRequest {
    let request = if keywords.is_empty() {
        CollectRequest::default()
    } else {
        CollectRequest::with_keywords(keywords)
    };
    if sites.is_empty() {
        request
    } else {
        request.with_sites(sites)
    }
}

fn knowledge_base(config: &CollectorConfig) -> KnowledgeBase {
    KnowledgeBase::new(
        CorpusStore::new(config.data_dir.clone()),
        Duration::from_secs(config.cache_ttl_secs),
    )
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{json}");
    Ok(())
}

fn parse_category(value: &str) -> Result<Category, String> {
    Category::parse(value).ok_or_else(|| format!("unknown category `{value}` (bens, servicos, obras)"))
}

fn parse_frequency(value: &str) -> Result<CollectFrequency, String> {
    CollectFrequency::parse(value)
        .ok_or_else(|| format!("unknown frequency `{value}` (diaria, semanal, mensal)"))
}

fn parse_rating(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(domain, level)| (domain.trim().to_string(), level.trim().to_string()))
        .ok_or_else(|| format!("expected domain=level, got `{value}`"))
}
