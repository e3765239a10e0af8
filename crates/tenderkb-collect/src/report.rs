use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tenderkb_core::ProcurementRecord;
use tokio::fs;

use crate::CollectSummary;

/// Writes `collect_summary.json` and `collect_brief.md` under `<reports_root>/<run_id>/`.
pub async fn write_reports(
    reports_root: &Path,
    summary: &CollectSummary,
    records: &[ProcurementRecord],
) -> Result<PathBuf> {
    let reports_dir = reports_root.join(summary.run_id.to_string());
    fs::create_dir_all(&reports_dir)
        .await
        .with_context(|| format!("creating {}", reports_dir.display()))?;

    let summary_json = serde_json::to_vec_pretty(summary).context("serializing collect summary")?;
    fs::write(reports_dir.join("collect_summary.json"), summary_json)
        .await
        .context("writing collect_summary.json")?;

    fs::write(reports_dir.join("collect_brief.md"), render_brief(summary, records))
        .await
        .context("writing collect_brief.md")?;

    Ok(reports_dir)
}

pub fn render_brief(summary: &CollectSummary, records: &[ProcurementRecord]) -> String {
    let mut by_category: BTreeMap<&str, usize> = BTreeMap::new();
    let mut by_site: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *by_category.entry(record.category.as_str()).or_default() += 1;
        *by_site
            .entry(record.source_site.as_deref().unwrap_or("(unknown)"))
            .or_default() += 1;
    }

    let sources = summary
        .sources
        .iter()
        .map(|s| {
            let error = s
                .error
                .as_deref()
                .map(|e| format!(" ({e})"))
                .unwrap_or_default();
            format!(
                "- {}: {} - {} pages, {} drafts, {} kept{}",
                s.source_id,
                s.status.as_str(),
                s.pages,
                s.drafts,
                s.kept,
                error
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "# Tender Collection Brief\n\n- Run ID: `{}`\n- Started: {}\n- Finished: {}\n- New records: {}\n- Duplicates skipped: {}\n- Rejected drafts: {}\n- Partition: {}\n\n## Sources\n{}\n\n## By Category\n{}\n\n## By Site\n{}\n",
        summary.run_id,
        summary.started_at,
        summary.finished_at,
        summary.new_records,
        summary.duplicates,
        summary.rejected,
        summary.partition_path.as_deref().unwrap_or("(none)"),
        sources,
        bullet_counts(&by_category),
        bullet_counts(&by_site),
    )
}

fn bullet_counts(counts: &BTreeMap<&str, usize>) -> String {
    if counts.is_empty() {
        return "- (none)".to_string();
    }
    counts
        .iter()
        .map(|(k, v)| format!("- {k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}
