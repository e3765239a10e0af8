use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::{atomic_write, StorageError};

/// Identifiers of records already ingested, persisted as a JSON array of strings.
///
/// Entries are only ever added. Every persist rewrites the whole file.
#[derive(Debug, Clone)]
pub struct IdentifierRegistry {
    path: PathBuf,
    ids: BTreeSet<String>,
    dirty: bool,
}

impl IdentifierRegistry {
    /// A missing or blank file is an empty registry. Anything else that is not a
    /// JSON string array is an error: running on top of it would re-ingest everything.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let ids = match fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeSet::new(),
            Ok(bytes) => {
                let list: Vec<String> = serde_json::from_slice(&bytes).map_err(|source| {
                    StorageError::CorruptRegistry {
                        path: path.clone(),
                        source,
                    }
                })?;
                list.into_iter().collect()
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(err) => return Err(StorageError::Io { path, source: err }),
        };
        debug!(path = %path.display(), entries = ids.len(), "loaded identifier registry");
        Ok(Self {
            path,
            ids,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns `false` when the identifier was already known.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let inserted = self.ids.insert(id.into());
        self.dirty |= inserted;
        inserted
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub async fn persist(&mut self) -> Result<(), StorageError> {
        let list: Vec<&str> = self.ids().collect();
        let bytes = serde_json::to_vec_pretty(&list).map_err(|source| StorageError::Serialize {
            what: "identifier registry",
            source,
        })?;
        atomic_write(&self.path, &bytes).await?;
        self.dirty = false;
        Ok(())
    }
}
