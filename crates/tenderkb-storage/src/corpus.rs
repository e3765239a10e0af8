use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tenderkb_core::{edital_key, LegacyDefaults, OutcomeRecord, ProcurementRecord};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::{atomic_write, StorageError};

pub const PARTITION_PREFIX: &str = "knowledge_base_";
pub const OUTCOME_HISTORY_FILE: &str = "historico_editais.json";

/// Append-by-run corpus: one JSON partition per collection run plus the
/// separately maintained outcome history, merged at read time.
#[derive(Debug, Clone)]
pub struct CorpusStore {
    data_dir: PathBuf,
    legacy_defaults: LegacyDefaults,
}

impl CorpusStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            legacy_defaults: LegacyDefaults::default(),
        }
    }

    pub fn with_legacy_defaults(mut self, defaults: LegacyDefaults) -> Self {
        self.legacy_defaults = defaults;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn outcome_history_path(&self) -> PathBuf {
        self.data_dir.join(OUTCOME_HISTORY_FILE)
    }

    pub fn partition_file_name(at: DateTime<Utc>) -> String {
        format!("{PARTITION_PREFIX}{}.json", at.format("%Y%m%d_%H%M%S"))
    }

    /// Writes the run's new records as a fresh partition. Runs with nothing new
    /// write nothing and return `None`.
    pub async fn write_partition(
        &self,
        at: DateTime<Utc>,
        records: &[ProcurementRecord],
    ) -> Result<Option<PathBuf>, StorageError> {
        if records.is_empty() {
            return Ok(None);
        }

        let base = Self::partition_file_name(at);
        let stem = base.trim_end_matches(".json");
        let mut path = self.data_dir.join(&base);
        let mut suffix = 1;
        while fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::Io {
                path: path.clone(),
                source: e,
            })?
        {
            path = self.data_dir.join(format!("{stem}_{suffix}.json"));
            suffix += 1;
        }

        let bytes = serde_json::to_vec_pretty(records).map_err(|source| StorageError::Serialize {
            what: "corpus partition",
            source,
        })?;
        atomic_write(&path, &bytes).await?;
        info!(path = %path.display(), records = records.len(), "wrote corpus partition");
        Ok(Some(path))
    }

    /// Partition files in chronological (file name) order.
    pub async fn partition_paths(&self) -> Result<Vec<PathBuf>, StorageError> {
        let mut entries = match fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(StorageError::Io {
                    path: self.data_dir.clone(),
                    source: err,
                })
            }
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| StorageError::Io {
            path: self.data_dir.clone(),
            source: e,
        })? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(PARTITION_PREFIX) && name.ends_with(".json") {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Every record from every readable partition. Unreadable files and
    /// individually invalid records are skipped with a warning.
    pub async fn load_partitions(&self) -> Result<Vec<ProcurementRecord>, StorageError> {
        let mut records = Vec::new();
        for path in self.partition_paths().await? {
            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable partition");
                    continue;
                }
            };
            let values: Vec<Value> = match serde_json::from_slice(&bytes) {
                Ok(values) => values,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unparseable partition");
                    continue;
                }
            };
            for (index, value) in values.into_iter().enumerate() {
                match serde_json::from_value::<ProcurementRecord>(value) {
                    Ok(record) => records.push(record.sanitized()),
                    Err(err) => {
                        warn!(path = %path.display(), index, error = %err, "skipping invalid record");
                    }
                }
            }
        }
        debug!(records = records.len(), "loaded corpus partitions");
        Ok(records)
    }

    /// The outcome history, or nothing when the file is absent or unreadable.
    pub async fn load_outcome_history(&self) -> Vec<OutcomeRecord> {
        let path = self.outcome_history_path();
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable outcome history");
                return Vec::new();
            }
        };
        match serde_json::from_slice::<Vec<OutcomeRecord>>(&bytes) {
            Ok(history) => history,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unparseable outcome history");
                Vec::new()
            }
        }
    }

    /// Full corpus: partitions first, then successful outcome history merged in.
    pub async fn load_snapshot(&self) -> Result<Vec<ProcurementRecord>, StorageError> {
        let scraped = self.load_partitions().await?;
        let history = self.load_outcome_history().await;
        Ok(merge_outcome_history(scraped, &history, &self.legacy_defaults))
    }
}

/// Folds successful outcome records into the scraped corpus.
///
/// A legacy record whose normalized edital number matches a scraped record
/// overrides that record's fields in place; the rest are appended in history order.
pub fn merge_outcome_history(
    mut records: Vec<ProcurementRecord>,
    history: &[OutcomeRecord],
    defaults: &LegacyDefaults,
) -> Vec<ProcurementRecord> {
    let mut by_key: HashMap<String, usize> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        if let Some(key) = edital_key(&record.edital_number) {
            by_key.entry(key).or_insert(index);
        }
    }

    for outcome in history.iter().filter(|o| o.success) {
        let existing = edital_key(&outcome.edital_id).and_then(|key| by_key.get(&key).copied());
        if let Some(index) = existing {
            outcome.apply_to(&mut records[index], defaults);
            continue;
        }
        match outcome.to_record(defaults) {
            Ok(record) => {
                if let Some(key) = edital_key(&record.edital_number) {
                    by_key.insert(key, records.len());
                }
                records.push(record);
            }
            Err(err) => {
                warn!(edital = %outcome.edital_id, error = %err, "skipping outcome record");
            }
        }
    }
    records
}
