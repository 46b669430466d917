#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record store for the stop-and-search corpus.
//!
//! Two backings implement [`RecordStore`]:
//!
//! * [`shard::ShardStore`] reads one JSON array per month from a directory
//!   and caches each parsed shard until explicitly invalidated.
//! * [`memory::MemoryStore`] holds an immutable in-memory snapshot (for
//!   example the expanded normalized corpus) that can be swapped atomically.
//!
//! Callers receive `Arc` chunks of [`TimedRecord`]s, so a scan keeps
//! reading the snapshot it started with even if the store is reloaded
//! underneath it.

pub mod memory;
pub mod normalize;
pub mod paths;
pub mod shard;

use std::sync::Arc;

use stop_search_record_models::time::TimeRange;
use stop_search_record_models::{StopSearchRecord, TimedRecord};

/// Errors that can occur while reading the corpus.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read access to an immutable corpus snapshot.
///
/// Implementations must be safe to share across threads; reads never
/// mutate the records they hand out.
pub trait RecordStore: Send + Sync {
    /// Returns the record chunks that may contain records inside `range`.
    ///
    /// Chunks can contain records outside the range; callers still apply
    /// the date predicate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing storage cannot be listed.
    fn chunks(&self, range: &TimeRange) -> Result<Vec<Arc<[TimedRecord]>>, StoreError>;

    /// Names of the shards backing this store, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing storage cannot be listed.
    fn shard_names(&self) -> Result<Vec<String>, StoreError>;

    /// Drops any cached state so the next read sees fresh data.
    fn invalidate(&self);
}

/// Pairs records with their parsed timestamps, skipping (and logging)
/// records whose timestamp does not parse.
#[must_use]
pub fn timed_records<I>(records: I, source: &str) -> Vec<TimedRecord>
where
    I: IntoIterator<Item = StopSearchRecord>,
{
    let mut skipped = 0_usize;
    let timed: Vec<TimedRecord> = records
        .into_iter()
        .filter_map(|record| match TimedRecord::from_record(record) {
            Ok(timed) => Some(timed),
            Err(record) => {
                log::warn!(
                    "Skipping record in {source} with malformed datetime '{}'",
                    record.datetime
                );
                skipped += 1;
                None
            }
        })
        .collect();
    if skipped > 0 {
        log::warn!("{source}: skipped {skipped} record(s) with malformed timestamps");
    }
    timed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_malformed_timestamps() {
        let records = vec![
            StopSearchRecord {
                datetime: "2023-06-10T12:00:00+00:00".to_string(),
                ..StopSearchRecord::default()
            },
            StopSearchRecord {
                datetime: "garbage".to_string(),
                ..StopSearchRecord::default()
            },
        ];
        let timed = timed_records(records, "test");
        assert_eq!(timed.len(), 1);
        assert_eq!(timed[0].record.datetime, "2023-06-10T12:00:00+00:00");
    }
}
