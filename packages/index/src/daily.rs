//! Day-keyed count maps and their on-disk files.
//!
//! Keys are UTC calendar dates (`YYYY-MM-DD`) or months (`YYYY-MM`). Files
//! are pretty JSON objects written atomically (temp file, then rename).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stop_search_aggregate_models::CategoryDimension;
use stop_search_record_models::time::TimeRange;
use stop_search_store::paths::ensure_dir;

use crate::IndexError;

/// `chrono` format of day keys.
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// `chrono` format of month keys.
pub const MONTH_KEY_FORMAT: &str = "%Y-%m";

/// Day key of an instant.
#[must_use]
pub fn day_key(at: &DateTime<Utc>) -> String {
    at.format(DAY_KEY_FORMAT).to_string()
}

/// Month key of an instant.
#[must_use]
pub fn month_key(at: &DateTime<Utc>) -> String {
    at.format(MONTH_KEY_FORMAT).to_string()
}

fn parse_day(key: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(key, DAY_KEY_FORMAT).ok();
    if date.is_none() {
        log::warn!("Ignoring malformed index key '{key}'");
    }
    date
}

/// `{YYYY-MM-DD: count}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyTotals(pub BTreeMap<String, u64>);

impl DailyTotals {
    /// Counts one record on `day`.
    pub fn record(&mut self, day: String) {
        *self.0.entry(day).or_insert(0) += 1;
    }

    /// Days overlapping `range` with their counts, in date order.
    pub fn days_in<'a>(
        &'a self,
        range: &'a TimeRange,
    ) -> impl Iterator<Item = (NaiveDate, u64)> + 'a {
        self.0
            .iter()
            .filter_map(|(key, count)| parse_day(key).map(|day| (day, *count)))
            .filter(|(day, _)| range.overlaps_day(*day))
    }

    /// Sum of the counts of days overlapping `range`.
    #[must_use]
    pub fn sum_in(&self, range: &TimeRange) -> u64 {
        self.days_in(range).map(|(_, count)| count).sum()
    }

    /// Sum of every count.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    /// Number of days with at least one record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no day has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `{YYYY-MM: count}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthlyTotals(pub BTreeMap<String, u64>);

impl MonthlyTotals {
    /// Counts one record in `month`.
    pub fn record(&mut self, month: String) {
        *self.0.entry(month).or_insert(0) += 1;
    }

    /// Sum of every count.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }
}

/// `{YYYY-MM-DD: {label: count}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyCategoryIndex(pub BTreeMap<String, BTreeMap<String, u64>>);

impl DailyCategoryIndex {
    /// Counts one record with `label` on `day`.
    pub fn record(&mut self, day: String, label: &str) {
        let counts = self.0.entry(day).or_default();
        if let Some(count) = counts.get_mut(label) {
            *count += 1;
        } else {
            counts.insert(label.to_string(), 1);
        }
    }

    /// Per-label totals over the days overlapping `range`.
    #[must_use]
    pub fn totals_in(&self, range: &TimeRange) -> BTreeMap<String, u64> {
        let mut totals = BTreeMap::new();
        for (key, counts) in &self.0 {
            let Some(day) = parse_day(key) else {
                continue;
            };
            if !range.overlaps_day(day) {
                continue;
            }
            for (label, count) in counts {
                *totals.entry(label.clone()).or_insert(0) += count;
            }
        }
        totals
    }

    /// Sum of every count.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().flat_map(BTreeMap::values).sum()
    }
}

/// The index files kept below the aggregation directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKind {
    /// Records per day.
    DailyTotals,
    /// Records per month.
    MonthlyTotals,
    /// Records per day and officer-defined ethnicity.
    Ethnicity,
    /// Records per day and borough.
    Borough,
    /// Records per day and age range.
    AgeRange,
}

impl IndexKind {
    /// Path of the index file relative to the aggregation directory.
    #[must_use]
    pub const fn relative_path(self) -> &'static str {
        match self {
            Self::DailyTotals => "total/daily-totals.json",
            Self::MonthlyTotals => "total/monthly-totals.json",
            Self::Ethnicity => "ethnicity/daily-ethnicity-totals.json",
            Self::Borough => "location/daily-borough-totals.json",
            Self::AgeRange => "age_range/daily-age-ranges.json",
        }
    }

    /// Absolute path of the index file below `aggregation_dir`.
    #[must_use]
    pub fn path(self, aggregation_dir: &Path) -> PathBuf {
        aggregation_dir.join(self.relative_path())
    }

    /// The per-category index for `dimension`.
    #[must_use]
    pub const fn for_dimension(dimension: CategoryDimension) -> Self {
        match dimension {
            CategoryDimension::Ethnicity => Self::Ethnicity,
            CategoryDimension::Borough => Self::Borough,
            CategoryDimension::AgeRange => Self::AgeRange,
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::DailyTotals,
            Self::MonthlyTotals,
            Self::Ethnicity,
            Self::Borough,
            Self::AgeRange,
        ]
    }
}

/// Reads an index file.
///
/// # Errors
///
/// Returns [`IndexError`] if the file cannot be read or parsed.
pub fn read_index<T: DeserializeOwned>(path: &Path) -> Result<T, IndexError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Writes an index file as pretty JSON, creating parent directories.
///
/// # Errors
///
/// Returns [`IndexError`] if serialization or the write fails.
pub fn write_index<T: Serialize>(path: &Path, index: &T) -> Result<(), IndexError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, serde_json::to_string_pretty(index)?)?;
    std::fs::rename(&tmp_path, path)?;
    log::debug!("Wrote index {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stop_search_record_models::time::{BoundSide, parse_bound};

    fn june() -> TimeRange {
        TimeRange::new(
            parse_bound("2023-06-01", BoundSide::Start),
            parse_bound("2023-06-30", BoundSide::End),
        )
    }

    #[test]
    fn sums_days_inside_range() {
        let mut totals = DailyTotals::default();
        for day in ["2023-05-31", "2023-06-01", "2023-06-01", "2023-06-30", "2023-07-01"] {
            totals.record(day.to_string());
        }
        assert_eq!(totals.sum_in(&june()), 3);
        assert_eq!(totals.sum_in(&TimeRange::unbounded()), 5);
        assert_eq!(totals.total(), 5);
        assert_eq!(totals.len(), 4);
    }

    #[test]
    fn malformed_keys_are_ignored() {
        let mut totals = DailyTotals::default();
        totals.0.insert("garbage".to_string(), 7);
        totals.0.insert("2023-06-10".to_string(), 2);
        assert_eq!(totals.sum_in(&TimeRange::unbounded()), 2);
    }

    #[test]
    fn category_totals_respect_range() {
        let mut index = DailyCategoryIndex::default();
        index.record("2023-06-10".to_string(), "White");
        index.record("2023-06-10".to_string(), "White");
        index.record("2023-06-11".to_string(), "Asian");
        index.record("2023-07-01".to_string(), "Black");

        let totals = index.totals_in(&june());
        assert_eq!(totals.get("White"), Some(&2));
        assert_eq!(totals.get("Asian"), Some(&1));
        assert!(!totals.contains_key("Black"));
        assert_eq!(index.total(), 4);
    }

    #[test]
    fn serializes_as_plain_objects() {
        let mut index = DailyCategoryIndex::default();
        index.record("2023-06-10".to_string(), "Camden");
        assert_eq!(
            serde_json::to_string(&index).unwrap(),
            r#"{"2023-06-10":{"Camden":1}}"#
        );
    }

    #[test]
    fn writes_and_reads_index_files() {
        let tmp = std::env::temp_dir().join("stop_search_index_daily_io");
        let _ = std::fs::remove_dir_all(&tmp);
        let path = IndexKind::DailyTotals.path(&tmp);

        let mut totals = DailyTotals::default();
        totals.record("2023-06-10".to_string());
        write_index(&path, &totals).unwrap();

        assert!(path.ends_with("total/daily-totals.json"));
        let read: DailyTotals = read_index(&path).unwrap();
        assert_eq!(read, totals);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn keys_are_utc_dates() {
        let at = stop_search_record_models::time::parse_timestamp("2023-06-10T00:30:00+01:00")
            .unwrap();
        assert_eq!(day_key(&at), "2023-06-09");
        assert_eq!(month_key(&at), "2023-06");
    }
}
