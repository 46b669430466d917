//! Offline index builders.
//!
//! One pass over the corpus fills every index at once. Each record counts
//! exactly once per index, under the UTC date of its timestamp.

use std::path::Path;

use stop_search_aggregate_models::CategoryDimension;
use stop_search_record_models::time::TimeRange;
use stop_search_record_models::{RecordField, StopSearchRecord, TimedRecord, UNKNOWN_LABEL};
use stop_search_store::RecordStore;

use crate::IndexError;
use crate::boundaries::BoroughLocator;
use crate::daily::{
    DailyCategoryIndex, DailyTotals, IndexKind, MonthlyTotals, day_key, month_key, write_index,
};
use crate::progress::ProgressCallback;

/// Every precomputed index for one corpus snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet {
    /// Records per day.
    pub daily_totals: DailyTotals,
    /// Records per month.
    pub monthly_totals: MonthlyTotals,
    /// Records per day and officer-defined ethnicity.
    pub ethnicity: DailyCategoryIndex,
    /// Records per day and borough.
    pub borough: DailyCategoryIndex,
    /// Records per day and age range.
    pub age_range: DailyCategoryIndex,
}

impl IndexSet {
    /// Counts one record into every index.
    pub fn add(&mut self, timed: &TimedRecord, locator: Option<&BoroughLocator>) {
        let day = day_key(&timed.occurred_at);
        let record = &timed.record;

        self.monthly_totals.record(month_key(&timed.occurred_at));
        self.ethnicity.record(
            day.clone(),
            &record
                .value(RecordField::OfficerDefinedEthnicity)
                .group_label(),
        );
        self.age_range
            .record(day.clone(), &record.value(RecordField::AgeRange).group_label());
        self.borough.record(day.clone(), borough_for(record, locator));
        self.daily_totals.record(day);
    }

    /// Counts every record of `records`.
    pub fn add_all<'a, I>(&mut self, records: I, locator: Option<&BoroughLocator>)
    where
        I: IntoIterator<Item = &'a TimedRecord>,
    {
        for timed in records {
            self.add(timed, locator);
        }
    }

    /// The per-day category index for `dimension`.
    #[must_use]
    pub const fn category(&self, dimension: CategoryDimension) -> &DailyCategoryIndex {
        match dimension {
            CategoryDimension::Ethnicity => &self.ethnicity,
            CategoryDimension::Borough => &self.borough,
            CategoryDimension::AgeRange => &self.age_range,
        }
    }

    /// Writes every index below `aggregation_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if any file cannot be written.
    pub fn write(&self, aggregation_dir: &Path) -> Result<(), IndexError> {
        for kind in IndexKind::all() {
            let path = kind.path(aggregation_dir);
            match kind {
                IndexKind::DailyTotals => write_index(&path, &self.daily_totals)?,
                IndexKind::MonthlyTotals => write_index(&path, &self.monthly_totals)?,
                IndexKind::Ethnicity => write_index(&path, &self.ethnicity)?,
                IndexKind::Borough => write_index(&path, &self.borough)?,
                IndexKind::AgeRange => write_index(&path, &self.age_range)?,
            }
        }
        log::info!(
            "Wrote {} daily totals ({} records) to {}",
            self.daily_totals.len(),
            self.daily_totals.total(),
            aggregation_dir.display()
        );
        Ok(())
    }
}

/// Borough assigned to `record`: the explicit field, then the polygon
/// containing its coordinates, then the street-name prefix.
///
/// Shared by the index builder and record scans.
#[must_use]
pub fn assigned_borough<'a>(
    record: &'a StopSearchRecord,
    locator: Option<&'a BoroughLocator>,
) -> Option<&'a str> {
    if let Some(borough) = record.borough.as_deref()
        && !borough.is_empty()
    {
        return Some(borough);
    }
    if let Some(locator) = locator
        && let Some((lat, lng)) = record.location.as_ref().and_then(|l| l.coordinates())
        && let Some(name) = locator.lookup(lat, lng)
    {
        return Some(name);
    }
    record.street_borough()
}

/// Borough label used when indexing `record`, [`UNKNOWN_LABEL`] when none
/// can be assigned.
#[must_use]
pub fn borough_for<'a>(
    record: &'a StopSearchRecord,
    locator: Option<&'a BoroughLocator>,
) -> &'a str {
    assigned_borough(record, locator).unwrap_or(UNKNOWN_LABEL)
}

/// Builds every index from the full contents of `store`.
///
/// Progress advances once per chunk (one shard for the shard store).
///
/// # Errors
///
/// Returns [`IndexError::Store`] if the store cannot be listed.
pub fn build_from_store(
    store: &dyn RecordStore,
    locator: Option<&BoroughLocator>,
    progress: &dyn ProgressCallback,
) -> Result<IndexSet, IndexError> {
    let chunks = store.chunks(&TimeRange::unbounded())?;
    progress.set_total(chunks.len() as u64);
    progress.set_message("Indexing shards".to_string());

    let mut set = IndexSet::default();
    for chunk in &chunks {
        set.add_all(chunk.iter(), locator);
        progress.inc(1);
    }

    progress.finish(format!(
        "Indexed {} records over {} days",
        set.daily_totals.total(),
        set.daily_totals.len()
    ));
    Ok(set)
}
