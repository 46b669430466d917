//! In-memory snapshot backing.
//!
//! The snapshot is an `Arc<[TimedRecord]>` replaced wholesale by
//! [`MemoryStore::replace`]; readers that already hold the previous
//! snapshot keep using it unchanged.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use stop_search_record_models::normalized::NormalizedCorpus;
use stop_search_record_models::time::TimeRange;
use stop_search_record_models::{StopSearchRecord, TimedRecord};

use crate::normalize::expand;
use crate::{RecordStore, StoreError, timed_records};

/// Name reported for the single in-memory chunk.
const SNAPSHOT_NAME: &str = "memory";

/// Immutable in-memory corpus with atomic snapshot replacement.
pub struct MemoryStore {
    snapshot: RwLock<Arc<[TimedRecord]>>,
}

impl MemoryStore {
    /// Builds a store from raw records, skipping malformed timestamps.
    #[must_use]
    pub fn new(records: Vec<StopSearchRecord>) -> Self {
        Self::from_timed(timed_records(records, SNAPSHOT_NAME))
    }

    /// Builds a store from already-timed records.
    #[must_use]
    pub fn from_timed(records: Vec<TimedRecord>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::from(records)),
        }
    }

    /// Builds a store from a normalized corpus.
    #[must_use]
    pub fn from_normalized(corpus: &NormalizedCorpus) -> Self {
        Self::new(expand(corpus))
    }

    /// Loads a normalized corpus file into a store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read or parsed.
    pub fn load_normalized(path: &Path) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path)?;
        let corpus: NormalizedCorpus = serde_json::from_str(&contents)?;
        log::info!(
            "Loaded normalized corpus from {} ({} records)",
            path.display(),
            corpus.search_data.len()
        );
        Ok(Self::from_normalized(&corpus))
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[TimedRecord]> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swaps in a new snapshot built from `records`.
    pub fn replace(&self, records: Vec<StopSearchRecord>) {
        let next: Arc<[TimedRecord]> = Arc::from(timed_records(records, SNAPSHOT_NAME));
        log::info!("Replacing in-memory snapshot ({} records)", next.len());
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

impl RecordStore for MemoryStore {
    fn chunks(&self, _range: &TimeRange) -> Result<Vec<Arc<[TimedRecord]>>, StoreError> {
        Ok(vec![self.snapshot()])
    }

    fn shard_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(vec![SNAPSHOT_NAME.to_string()])
    }

    fn invalidate(&self) {}
}
