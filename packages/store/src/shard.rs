//! Monthly shard directory backing.
//!
//! Each shard is a JSON array of records named `YYYY-MM.json`. Parsed
//! shards are cached by name for the lifetime of the store; the cache is
//! only cleared by [`ShardStore::invalidate`]. A missing or corrupt shard
//! is logged and treated as empty so one bad file never fails a query.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{Datelike as _, NaiveDate};
use stop_search_record_models::time::{TimeRange, end_of_day, start_of_day};
use stop_search_record_models::{StopSearchRecord, TimedRecord};

use crate::{RecordStore, StoreError, timed_records};

/// File extension of shard files.
const SHARD_EXTENSION: &str = "json";

/// Directory of monthly shards with a per-shard parse cache.
pub struct ShardStore {
    dir: PathBuf,
    cache: RwLock<BTreeMap<String, Arc<[TimedRecord]>>>,
}

impl ShardStore {
    /// Creates a store reading shards from `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(BTreeMap::new()),
        }
    }

    /// Lists available shard names (file stems), sorted.
    ///
    /// A missing directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory exists but cannot be read.
    pub fn available_shards(&self) -> Result<Vec<String>, StoreError> {
        if !self.dir.is_dir() {
            log::warn!("Shard directory {} not found", self.dir.display());
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SHARD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Shards whose month can hold records inside `range`.
    ///
    /// The feed files records by local month, so a shard can hold UTC
    /// instants up to a day outside its month; the month is widened by one
    /// day on each side before comparing. Shards whose name is not a
    /// `YYYY-MM` month are always included.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be read.
    pub fn relevant_shards(&self, range: &TimeRange) -> Result<Vec<String>, StoreError> {
        let names = self.available_shards()?;
        if range.start.is_none() && range.end.is_none() {
            return Ok(names);
        }
        Ok(names
            .into_iter()
            .filter(|name| {
                shard_month(name).is_none_or(|(first, last)| {
                    let first = first.pred_opt().unwrap_or(first);
                    let last = last.succ_opt().unwrap_or(last);
                    range.start.is_none_or(|start| end_of_day(last) >= start)
                        && range.end.is_none_or(|end| start_of_day(first) <= end)
                })
            })
            .collect())
    }

    /// Returns the parsed records of shard `name`, loading and caching
    /// them on first access.
    #[must_use]
    pub fn load_shard(&self, name: &str) -> Arc<[TimedRecord]> {
        if let Some(records) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Arc::clone(records);
        }

        let path = self.dir.join(format!("{name}.{SHARD_EXTENSION}"));
        if !path.is_file() {
            log::warn!("Data file not found: {}", path.display());
            return Arc::from(Vec::new());
        }

        let records: Arc<[TimedRecord]> = match read_shard(&path) {
            Ok(records) => Arc::from(timed_records(records, name)),
            Err(e) => {
                log::warn!("Skipping shard {}: {e}", path.display());
                Arc::from(Vec::new())
            }
        };
        log::debug!("Loaded {} records from shard {name}", records.len());

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry(name.to_string()).or_insert(records))
    }

    /// Number of shards currently held in the cache.
    #[must_use]
    pub fn cached_shards(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl RecordStore for ShardStore {
    fn chunks(&self, range: &TimeRange) -> Result<Vec<Arc<[TimedRecord]>>, StoreError> {
        Ok(self
            .relevant_shards(range)?
            .iter()
            .map(|name| self.load_shard(name))
            .collect())
    }

    fn shard_names(&self) -> Result<Vec<String>, StoreError> {
        self.available_shards()
    }

    fn invalidate(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        log::info!("Cleared shard cache for {}", self.dir.display());
    }
}

/// Reads one shard, keeping every record that deserializes.
///
/// # Errors
///
/// Returns [`StoreError`] if the file cannot be read or is not a JSON array.
pub fn read_shard(path: &Path) -> Result<Vec<StopSearchRecord>, StoreError> {
    let contents = std::fs::read_to_string(path)?;
    let values: Vec<serde_json::Value> = serde_json::from_str(&contents)?;

    let mut records = Vec::with_capacity(values.len());
    for (idx, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<StopSearchRecord>(value) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("Skipping record {idx} in {}: {e}", path.display()),
        }
    }
    Ok(records)
}

/// First and last day of the month a `YYYY-MM` shard name denotes.
fn shard_month(name: &str) -> Option<(NaiveDate, NaiveDate)> {
    let (year, month) = name.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = next.pred_opt()?;
    debug_assert_eq!(last.month(), first.month());
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stop_search_record_models::time::parse_timestamp;

    fn write_shard(dir: &Path, name: &str, contents: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(format!("{name}.json")), contents).unwrap();
    }

    fn fresh_dir(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&tmp);
        tmp
    }

    #[test]
    fn lists_json_shards_sorted() {
        let tmp = fresh_dir("stop_search_shard_list");
        write_shard(&tmp, "2023-07", "[]");
        write_shard(&tmp, "2023-06", "[]");
        std::fs::write(tmp.join("README.txt"), "ignore me").unwrap();

        let store = ShardStore::new(&tmp);
        assert_eq!(store.available_shards().unwrap(), ["2023-06", "2023-07"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_directory_is_empty() {
        let store = ShardStore::new(fresh_dir("stop_search_shard_missing"));
        assert!(store.available_shards().unwrap().is_empty());
        assert!(store.chunks(&TimeRange::unbounded()).unwrap().is_empty());
    }

    #[test]
    fn selects_overlapping_months() {
        let tmp = fresh_dir("stop_search_shard_relevant");
        for name in ["2023-04", "2023-05", "2023-06", "2023-07", "2023-08", "misc"] {
            write_shard(&tmp, name, "[]");
        }
        let store = ShardStore::new(&tmp);
        let range = TimeRange::new(
            parse_timestamp("2023-06-10T00:00:00Z"),
            parse_timestamp("2023-06-20T23:59:59Z"),
        );
        assert_eq!(store.relevant_shards(&range).unwrap(), ["2023-06", "misc"]);

        let open_start = TimeRange::new(None, parse_timestamp("2023-05-15T00:00:00Z"));
        assert_eq!(
            store.relevant_shards(&open_start).unwrap(),
            ["2023-04", "2023-05", "misc"]
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn neighbouring_shards_cover_month_edges() {
        let tmp = fresh_dir("stop_search_shard_month_edges");
        write_shard(&tmp, "2023-05", "[]");
        write_shard(
            &tmp,
            "2023-06",
            r#"[{"datetime":"2023-06-01T00:30:00+01:00"}]"#,
        );
        write_shard(&tmp, "2023-07", "[]");
        let store = ShardStore::new(&tmp);

        let may = TimeRange::new(
            parse_timestamp("2023-05-01T00:00:00Z"),
            parse_timestamp("2023-05-31T23:59:59Z"),
        );
        assert_eq!(store.relevant_shards(&may).unwrap(), ["2023-05", "2023-06"]);

        let in_may: usize = store
            .chunks(&may)
            .unwrap()
            .iter()
            .flat_map(|chunk| chunk.iter())
            .filter(|timed| may.contains(&timed.occurred_at))
            .count();
        assert_eq!(in_may, 1);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn corrupt_shard_is_skipped() {
        let tmp = fresh_dir("stop_search_shard_corrupt");
        write_shard(&tmp, "2023-06", "{not json");
        write_shard(
            &tmp,
            "2023-07",
            r#"[{"datetime":"2023-07-01T10:00:00+00:00"}]"#,
        );
        let store = ShardStore::new(&tmp);
        let chunks = store.chunks(&TimeRange::unbounded()).unwrap();
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, 1);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn bad_records_do_not_poison_the_shard() {
        let tmp = fresh_dir("stop_search_shard_bad_record");
        write_shard(
            &tmp,
            "2023-06",
            r#"[
                {"datetime":"2023-06-10T10:00:00+00:00","age_range":"18-24"},
                {"datetime":"2023-06-11T10:00:00+00:00","age_range":42},
                {"datetime":"not a date"}
            ]"#,
        );
        let store = ShardStore::new(&tmp);
        let records = store.load_shard("2023-06");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record.age_range.as_deref(), Some("18-24"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn caches_until_invalidated() {
        let tmp = fresh_dir("stop_search_shard_cache");
        write_shard(&tmp, "2023-06", r#"[{"datetime":"2023-06-10T10:00:00Z"}]"#);
        let store = ShardStore::new(&tmp);

        assert_eq!(store.load_shard("2023-06").len(), 1);
        assert_eq!(store.cached_shards(), 1);

        write_shard(
            &tmp,
            "2023-06",
            r#"[{"datetime":"2023-06-10T10:00:00Z"},{"datetime":"2023-06-11T10:00:00Z"}]"#,
        );
        assert_eq!(store.load_shard("2023-06").len(), 1);

        store.invalidate();
        assert_eq!(store.cached_shards(), 0);
        assert_eq!(store.load_shard("2023-06").len(), 2);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parses_shard_months() {
        let (first, last) = shard_month("2024-02").unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let (_, last) = shard_month("2023-12").unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert!(shard_month("misc").is_none());
        assert!(shard_month("2023-13").is_none());
    }
}
