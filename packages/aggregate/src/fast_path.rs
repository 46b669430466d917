//! Answers from the precomputed daily indexes.
//!
//! An index only knows day and (optionally) one category, so it can stand
//! in for a scan only when no categorical filter is active and the range
//! covers whole UTC days. Every function here returns `None` when the index
//! has nothing in range; callers treat that as stale and scan instead.

use std::collections::BTreeMap;

use stop_search_aggregate_models::{AggregationResult, FilterMap};
use stop_search_index::daily::{DailyCategoryIndex, DailyTotals};
use stop_search_record_models::time::TimeRange;

use crate::engine::{DayHistogram, bucketize};
use crate::granularity::is_day_aligned;

/// Returns `true` if an index lookup is equivalent to a scan for this
/// range and filter set.
#[must_use]
pub fn is_eligible(range: &TimeRange, filters: &FilterMap) -> bool {
    filters.is_unconstrained() && is_day_aligned(range)
}

/// Time-series aggregation from the daily totals index.
#[must_use]
pub fn aggregate_from_index(index: &DailyTotals, range: &TimeRange) -> Option<AggregationResult> {
    let mut histogram = DayHistogram::default();
    for (day, count) in index.days_in(&TimeRange::unbounded()) {
        histogram.observe(day);
        if range.overlaps_day(day) {
            histogram.add(day, count);
        }
    }
    if histogram.total() == 0 {
        return None;
    }
    Some(bucketize(range, &histogram))
}

/// Record count from the daily totals index.
#[must_use]
pub fn count_from_index(index: &DailyTotals, range: &TimeRange) -> Option<u64> {
    Some(index.sum_in(range)).filter(|total| *total > 0)
}

/// Category totals from a per-day category index.
#[must_use]
pub fn category_totals_from_index(
    index: &DailyCategoryIndex,
    range: &TimeRange,
) -> Option<BTreeMap<String, u64>> {
    let totals = index.totals_in(range);
    if totals.values().sum::<u64>() == 0 {
        return None;
    }
    Some(totals)
}
