use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tenderkb_adapters::{adapter_for_source, finalize_draft, load_fixture_page, SourceAdapter};
use tenderkb_core::{Category, RecordDraft};

#[derive(Debug, Deserialize, PartialEq)]
struct GoldenRecord {
    id: String,
    edital_number: String,
    object: String,
    category: Category,
    modality: Option<String>,
    estimated_value: Option<f64>,
    opening_date: Option<String>,
}

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .expect("workspace root")
}

fn fetched_at() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-02T12:00:00Z")
        .expect("timestamp")
        .with_timezone(&Utc)
}

async fn walk_fixture(adapter: &dyn SourceAdapter, first_page: &str) -> (Vec<RecordDraft>, usize) {
    let mut drafts = Vec::new();
    let mut pages = 0;
    let mut next = Some(workspace_root().join(first_page).display().to_string());
    while let Some(path) = next.take() {
        let page = load_fixture_page(&path, adapter.format(), fetched_at())
            .await
            .expect("fixture page");
        let parsed = adapter.parse_listing(&page).expect("parse listing");
        pages += 1;
        drafts.extend(parsed.drafts);
        next = parsed.next_page;
    }
    (drafts, pages)
}

fn to_golden(source_id: &str, drafts: Vec<RecordDraft>) -> Vec<GoldenRecord> {
    drafts
        .into_iter()
        .map(|draft| {
            let (id, record) = finalize_draft(source_id, draft).expect("valid draft");
            GoldenRecord {
                id,
                edital_number: record.edital_number,
                object: record.object,
                category: record.category,
                modality: record.modality,
                estimated_value: record.estimated_value,
                opening_date: record.opening_date,
            }
        })
        .collect()
}

fn read_snapshot(source_id: &str) -> Vec<GoldenRecord> {
    let path = workspace_root()
        .join("fixtures")
        .join(source_id)
        .join("snapshot.json");
    let text = std::fs::read_to_string(&path).expect("read snapshot");
    serde_json::from_str(&text).expect("parse snapshot")
}

#[tokio::test]
async fn correios_listing_matches_snapshot_across_pages() {
    let adapter = adapter_for_source("correios-editais").expect("adapter");
    let (drafts, pages) = walk_fixture(adapter.as_ref(), "fixtures/correios-editais/page1.html").await;
    assert_eq!(pages, 2);
    assert!(drafts
        .iter()
        .all(|d| d.issuing_body.as_deref() == Some("Correios")));
    assert!(drafts[0].notes.as_deref().is_some_and(|n| n.contains("UASG 441001")));
    assert_eq!(to_golden("correios-editais", drafts), read_snapshot("correios-editais"));
}

#[tokio::test]
async fn comprasnet_listing_matches_snapshot() {
    let adapter = adapter_for_source("comprasnet").expect("adapter");
    let (drafts, pages) = walk_fixture(adapter.as_ref(), "fixtures/comprasnet/listing.html").await;
    assert_eq!(pages, 1);
    assert_eq!(drafts[0].proposal_count, Some(14));
    assert_eq!(
        drafts[1].issuing_body.as_deref(),
        Some("Universidade Federal de Goiás")
    );
    assert_eq!(to_golden("comprasnet", drafts), read_snapshot("comprasnet"));
}

#[tokio::test]
async fn dados_abertos_listing_matches_snapshot() {
    let adapter = adapter_for_source("dados-abertos").expect("adapter");
    let (drafts, pages) = walk_fixture(adapter.as_ref(), "fixtures/dados-abertos/page1.json").await;
    assert_eq!(pages, 2);
    assert_eq!(drafts[0].contracted_value, Some(598_300.0));
    assert_eq!(drafts[0].result_date.as_deref(), Some("2023-07-03"));
    assert_eq!(drafts[0].execution_term_days, Some(365));
    assert_eq!(drafts[1].proposal_count, Some(4));
    assert_eq!(drafts[1].technical_specs.len(), 3);
    assert_eq!(to_golden("dados-abertos", drafts), read_snapshot("dados-abertos"));
}
