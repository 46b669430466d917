//! Scan-based aggregation.
//!
//! A scan reduces the corpus to per-day survivor counts ([`DayHistogram`]),
//! then [`bucketize`] turns those into the buckets for the range's
//! granularity. The index fast path feeds the same function from the
//! precomputed daily totals, so both paths bucket identically.

use std::collections::BTreeMap;

use chrono::{Datelike as _, NaiveDate};
use stop_search_aggregate_models::{
    AggregationResult, Bucket, CategoryDimension, FilterMap, Granularity,
};
use stop_search_index::daily::{DAY_KEY_FORMAT, MONTH_KEY_FORMAT, month_key};
use stop_search_record_models::TimedRecord;
use stop_search_record_models::time::TimeRange;

use crate::filter::{FieldMatch, Predicate};
use crate::granularity::granularity_for;

/// Label of the single [`Granularity::Total`] bucket.
pub const TOTAL_LABEL: &str = "Total";

/// Survivor counts per UTC day, plus the first and last day of the
/// corpus that was scanned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayHistogram {
    counts: BTreeMap<NaiveDate, u64>,
    span: Option<(NaiveDate, NaiveDate)>,
}

impl DayHistogram {
    /// Scans `records` once, counting those that pass `predicate`.
    pub fn scan<'a, I>(records: I, predicate: &Predicate) -> Self
    where
        I: IntoIterator<Item = &'a TimedRecord>,
    {
        let mut histogram = Self::default();
        for timed in records {
            let day = timed.occurred_at.date_naive();
            histogram.observe(day);
            if predicate.matches(timed) {
                histogram.add(day, 1);
            }
        }
        histogram
    }

    /// Widens the corpus span to include `day`.
    pub fn observe(&mut self, day: NaiveDate) {
        self.span = Some(match self.span {
            None => (day, day),
            Some((first, last)) => (first.min(day), last.max(day)),
        });
    }

    /// Adds `count` survivors on `day`.
    pub fn add(&mut self, day: NaiveDate, count: u64) {
        *self.counts.entry(day).or_insert(0) += count;
    }

    /// Total survivors.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Buckets the survivors of `histogram` for `range`.
///
/// Open bounds fall back to the corpus span. Every bucket of the range is
/// emitted, including empty ones. An inverted range yields no buckets.
#[must_use]
pub fn bucketize(range: &TimeRange, histogram: &DayHistogram) -> AggregationResult {
    let granularity = granularity_for(range);
    if range.is_inverted() {
        return AggregationResult {
            aggregation_type: granularity,
            buckets: Vec::new(),
            total_records: 0,
        };
    }

    let first = range
        .start
        .map(|start| start.date_naive())
        .or_else(|| histogram.span.map(|(first, _)| first));
    let last = range
        .end
        .map(|end| end.date_naive())
        .or_else(|| histogram.span.map(|(_, last)| last));
    let mut buckets = match (first, last) {
        (Some(first), Some(last)) => plan(granularity, first, last),
        _ => Vec::new(),
    };

    let positions: BTreeMap<String, usize> = buckets
        .iter()
        .enumerate()
        .filter_map(|(idx, bucket)| bucket.iso_key.clone().map(|key| (key, idx)))
        .collect();
    for (day, count) in &histogram.counts {
        let idx = match bucket_key(granularity, *day) {
            None => buckets.first().map(|_| 0),
            Some(key) => positions.get(&key).copied(),
        };
        match idx {
            Some(idx) => buckets[idx].value += count,
            None => log::debug!("No {granularity} bucket for {day}; dropping {count} record(s)"),
        }
    }

    let total_records = buckets.iter().map(|b| b.value).sum();
    AggregationResult {
        aggregation_type: granularity,
        buckets,
        total_records,
    }
}

/// Empty buckets covering `[first, last]`, in chronological order.
fn plan(granularity: Granularity, first: NaiveDate, last: NaiveDate) -> Vec<Bucket> {
    match granularity {
        Granularity::Total => vec![Bucket {
            label: TOTAL_LABEL.to_string(),
            value: 0,
            iso_key: None,
        }],
        Granularity::Day => first
            .iter_days()
            .take_while(|day| *day <= last)
            .map(|day| Bucket {
                label: day.day().to_string(),
                value: 0,
                iso_key: Some(day.format(DAY_KEY_FORMAT).to_string()),
            })
            .collect(),
        Granularity::Month => (1..=12)
            .filter_map(|month| NaiveDate::from_ymd_opt(first.year(), month, 1))
            .map(|month| Bucket {
                label: month.format("%b").to_string(),
                value: 0,
                iso_key: Some(month.format(MONTH_KEY_FORMAT).to_string()),
            })
            .collect(),
        Granularity::Year => (first.year()..=last.year())
            .map(|year| Bucket {
                label: year.to_string(),
                value: 0,
                iso_key: Some(year.to_string()),
            })
            .collect(),
    }
}

fn bucket_key(granularity: Granularity, day: NaiveDate) -> Option<String> {
    match granularity {
        Granularity::Total => None,
        Granularity::Day => Some(day.format(DAY_KEY_FORMAT).to_string()),
        Granularity::Month => Some(day.format(MONTH_KEY_FORMAT).to_string()),
        Granularity::Year => Some(day.year().to_string()),
    }
}

/// Time-series aggregation by raw scan.
pub fn aggregate<'a, I>(records: I, range: &TimeRange, filters: &FilterMap) -> AggregationResult
where
    I: IntoIterator<Item = &'a TimedRecord>,
{
    aggregate_with(records, &Predicate::new(*range, filters))
}

/// [`aggregate`] with a prepared predicate.
pub fn aggregate_with<'a, I>(records: I, predicate: &Predicate) -> AggregationResult
where
    I: IntoIterator<Item = &'a TimedRecord>,
{
    bucketize(predicate.range(), &DayHistogram::scan(records, predicate))
}

/// Survivor counts grouped by `dimension`. Missing values count as
/// `"Unknown"`; values with no survivors are absent.
pub fn category_totals<'a, I>(
    records: I,
    predicate: &Predicate,
    dimension: CategoryDimension,
) -> BTreeMap<String, u64>
where
    I: IntoIterator<Item = &'a TimedRecord>,
{
    let field = dimension.field();
    let mut totals = BTreeMap::new();
    for timed in records {
        if !predicate.matches(timed) {
            continue;
        }
        let label = predicate.value(&timed.record, field).group_label();
        if let Some(count) = totals.get_mut(label.as_ref()) {
            *count += 1;
        } else {
            totals.insert(label.into_owned(), 1);
        }
    }
    totals
}

/// Number of records passing `predicate` and, if given, `field_match`.
pub fn count<'a, I>(records: I, predicate: &Predicate, field_match: Option<&FieldMatch>) -> u64
where
    I: IntoIterator<Item = &'a TimedRecord>,
{
    let mut total = 0;
    for timed in records {
        if predicate.matches(timed)
            && field_match.is_none_or(|m| m.matches(&predicate.value(&timed.record, m.field())))
        {
            total += 1;
        }
    }
    total
}

/// Record counts per `YYYY-MM`.
pub fn records_by_month<'a, I>(records: I) -> BTreeMap<String, u64>
where
    I: IntoIterator<Item = &'a TimedRecord>,
{
    let mut months = BTreeMap::new();
    for timed in records {
        *months.entry(month_key(&timed.occurred_at)).or_insert(0) += 1;
    }
    months
}
