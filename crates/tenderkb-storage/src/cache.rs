use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tenderkb_core::ProcurementRecord;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{CorpusStore, StorageError};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for expiry tests.
#[derive(Debug)]
pub struct ManualClock {
    now: StdMutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: StdMutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let step = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now = *now + step;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

struct Loaded {
    at: DateTime<Utc>,
    records: Arc<[ProcurementRecord]>,
}

/// Time-boxed snapshot of the corpus. Expiry is purely time based: a snapshot
/// is reused until `ttl` has elapsed since it was loaded.
pub struct CorpusCache {
    store: CorpusStore,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    loaded: Mutex<Option<Loaded>>,
}

impl CorpusCache {
    pub fn new(store: CorpusStore, ttl: Duration) -> Self {
        Self::with_clock(store, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(store: CorpusStore, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            ttl,
            clock,
            loaded: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    pub async fn snapshot(&self) -> Result<Arc<[ProcurementRecord]>, StorageError> {
        let now = self.clock.now();
        let mut loaded = self.loaded.lock().await;
        if let Some(current) = loaded.as_ref() {
            let age = (now - current.at).to_std().unwrap_or(Duration::ZERO);
            if age < self.ttl {
                return Ok(current.records.clone());
            }
        }

        let records: Arc<[ProcurementRecord]> = self.store.load_snapshot().await?.into();
        debug!(records = records.len(), "corpus cache reloaded");
        *loaded = Some(Loaded {
            at: now,
            records: records.clone(),
        });
        Ok(records)
    }
}
