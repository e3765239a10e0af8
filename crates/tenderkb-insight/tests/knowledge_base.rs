use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tempfile::{tempdir, TempDir};
use tenderkb_core::{Category, MatchQuery, ProcurementRecord, RiskDomain, RiskInput, RiskLevel};
use tenderkb_insight::{KnowledgeBase, NO_PRECEDENT_MESSAGE};
use tenderkb_storage::{CorpusStore, ManualClock, OUTCOME_HISTORY_FILE};

fn history_fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures/history")
        .join(OUTCOME_HISTORY_FILE)
}

fn at(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
}

fn scraped() -> Vec<ProcurementRecord> {
    let mut cleaning = ProcurementRecord::new("PE 0012/2024", "Serviços de limpeza predial", Category::Services);
    cleaning.bidding_type = Some("pregao".into());
    cleaning.estimated_value = Some(480_000.0);
    cleaning.execution_term_days = Some(365);
    cleaning.technical_specs = vec!["Equipe mínima de 10 serventes".into()];
    cleaning.proposal_count = Some(9);

    let mut maintenance = ProcurementRecord::new(
        "PE 0044/2024",
        "Manutenção predial preventiva",
        Category::Services,
    );
    maintenance.bidding_type = Some("pregao".into());
    maintenance.modality = Some("eletronica".into());
    maintenance.estimated_value = Some(200_000.0);
    maintenance.execution_term_days = Some(180);
    maintenance.technical_specs = vec!["NR-10".into()];
    maintenance.proposal_count = Some(4);

    let notebooks = ProcurementRecord::new("DL 0002/2024", "Aquisição de notebooks", Category::Goods);

    vec![cleaning, maintenance, notebooks]
}

async fn seeded_store(dir: &TempDir) -> CorpusStore {
    let store = CorpusStore::new(dir.path().join("data"));
    store
        .write_partition(at("2024-05-02T08:00:00Z"), &scraped())
        .await
        .unwrap();
    std::fs::copy(history_fixture(), store.outcome_history_path()).unwrap();
    store
}

#[tokio::test]
async fn consult_ranks_precedents_and_derives_recommendations() {
    let dir = tempdir().unwrap();
    let kb = KnowledgeBase::new(seeded_store(&dir).await, Duration::from_secs(300));
    let query = MatchQuery::new(Category::Services)
        .with_object("limpeza predial")
        .with_bidding_type("pregao");

    let consultation = kb.consult(&query, 5).await.unwrap();

    assert_eq!(consultation.found, 3);
    assert!(consultation.message.is_none());
    let ranked: Vec<_> = consultation
        .similar
        .iter()
        .map(|s| (s.record.edital_number.as_str(), s.similarity_score))
        .collect();
    assert_eq!(
        ranked,
        vec![("PE 0012/2024", 19), ("PE 0044/2024", 17), ("PE-0021-2023", 5)]
    );

    // The outcome history overrode the scraped cleaning tender in place.
    let cleaning = &consultation.similar[0].record;
    assert_eq!(cleaning.contracted_value, Some(452_000.0));
    assert_eq!(cleaning.proposal_count, Some(12));
    assert_eq!(cleaning.modality.as_deref(), Some("eletronica"));

    let insights = consultation.insights.as_ref().unwrap();
    assert_eq!(insights.total_analyzed, 3);
    assert_eq!(insights.success_factors.len(), 4);
    assert_eq!(insights.modalities[0].count, 3);

    assert_eq!(
        consultation.recommendations,
        vec![
            "Apply: Visita técnica facultativa ampliou a participação (present in 1 similar tenders)",
            "Consider specification: Equipe mínima de 10 serventes (used in 1 cases)",
            "Suggested reference value: R$ 261,833.33 (based on similar tenders)",
            "Suggested execution term: 272 days (based on similar cases)",
            "Recommended modality: eletronica (used in 3 cases)",
            "moderate, consider relaxing specs",
        ]
    );
}

#[tokio::test]
async fn top_n_limits_similar_but_not_found() {
    let dir = tempdir().unwrap();
    let kb = KnowledgeBase::new(seeded_store(&dir).await, Duration::from_secs(300));
    let query = MatchQuery::new(Category::Services)
        .with_object("limpeza predial")
        .with_bidding_type("pregao");

    let consultation = kb.consult(&query, 2).await.unwrap();
    assert_eq!(consultation.found, 3);
    assert_eq!(consultation.similar.len(), 2);
    assert_eq!(consultation.insights.unwrap().total_analyzed, 2);
}

#[tokio::test]
async fn no_precedent_is_a_message_not_an_error() {
    let dir = tempdir().unwrap();
    let kb = KnowledgeBase::new(seeded_store(&dir).await, Duration::from_secs(300));
    let query = MatchQuery::new(Category::Works).with_object("pavimentação asfáltica");

    let consultation = kb.consult(&query, 5).await.unwrap();
    assert_eq!(consultation.found, 0);
    assert!(consultation.similar.is_empty());
    assert!(consultation.insights.is_none());
    assert!(consultation.recommendations.is_empty());
    assert_eq!(consultation.message.as_deref(), Some(NO_PRECEDENT_MESSAGE));

    let json = serde_json::to_value(&consultation).unwrap();
    assert!(json.get("insights").is_none());
}

#[tokio::test]
async fn cached_snapshot_hides_new_partitions_until_ttl_expires() {
    let dir = tempdir().unwrap();
    let store = seeded_store(&dir).await;
    let writer = CorpusStore::new(store.data_dir());
    let clock = Arc::new(ManualClock::new(at("2024-05-02T09:00:00Z")));
    let kb = KnowledgeBase::with_clock(store, Duration::from_secs(300), clock.clone());

    assert_eq!(kb.analytics().await.unwrap().general.total_records, 4);

    let extra = ProcurementRecord::new("PE 0090/2024", "Reforma de agência", Category::Works);
    writer
        .write_partition(at("2024-05-03T08:00:00Z"), &[extra])
        .await
        .unwrap();

    clock.advance(Duration::from_secs(299));
    assert_eq!(kb.analytics().await.unwrap().general.total_records, 4);

    clock.advance(Duration::from_secs(1));
    let analytics = kb.analytics().await.unwrap();
    assert_eq!(analytics.general.total_records, 5);
    assert_eq!(analytics.general.by_category.get("obras"), Some(&1));
}

#[tokio::test]
async fn analytics_cover_scraped_and_legacy_records() {
    let dir = tempdir().unwrap();
    let kb = KnowledgeBase::new(seeded_store(&dir).await, Duration::from_secs(300));

    let analytics = kb.analytics().await.unwrap();
    assert_eq!(analytics.general.total_records, 4);
    assert_eq!(analytics.general.by_category.get("servicos"), Some(&2));
    assert_eq!(analytics.general.by_category.get("bens"), Some(&2));
    assert_eq!(analytics.trends.first_period.as_deref(), Some("2023-11"));
    assert_eq!(analytics.trends.last_period.as_deref(), Some("2024-04"));
    assert_eq!(analytics.trends.undated, 2);
}

#[test]
fn risk_assessment_is_available_without_a_corpus() {
    let kb = KnowledgeBase::new(CorpusStore::new("unused"), Duration::from_secs(300));
    let risk = kb.assess_risk(
        &RiskInput::new()
            .with(RiskDomain::Legal, RiskLevel::Alto)
            .with(RiskDomain::Technical, RiskLevel::Baixo)
            .with(RiskDomain::Financial, RiskLevel::Medio),
    );
    assert_eq!(risk.weighted_score, 2.1);
    assert_eq!(risk.category, RiskLevel::Medio);
    assert_eq!(risk.success_probability, 0.65);
    assert_eq!(risk.risk_factors.len(), 1);
}
