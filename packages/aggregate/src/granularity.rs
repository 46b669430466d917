//! Time-bucketing level for a date range.
//!
//! A start bound must be exactly midnight. End bounds compare at second
//! resolution, so `23:59:59` and `23:59:59.999` both close the day.

use chrono::{DateTime, Datelike as _, NaiveDate, Timelike as _, Utc};
use stop_search_aggregate_models::Granularity;
use stop_search_record_models::time::TimeRange;

/// Picks the granularity for `[start, end]`.
///
/// * same UTC calendar day: [`Granularity::Total`]
/// * exactly one whole calendar month: [`Granularity::Day`]
/// * exactly one whole calendar year: [`Granularity::Month`]
/// * anything else: [`Granularity::Year`]
#[must_use]
pub fn select_granularity(start: &DateTime<Utc>, end: &DateTime<Utc>) -> Granularity {
    let (first, last) = (start.date_naive(), end.date_naive());
    if first == last {
        return Granularity::Total;
    }
    if !is_start_of_day(start) || !is_end_of_day(end) {
        return Granularity::Year;
    }
    let same_year = first.year() == last.year();
    if same_year && first.month() == last.month() && first.day() == 1 && is_last_day_of_month(last)
    {
        return Granularity::Day;
    }
    if same_year && first.ordinal() == 1 && last.month() == 12 && last.day() == 31 {
        return Granularity::Month;
    }
    Granularity::Year
}

/// Granularity for a possibly open range. Open ranges bucket by year.
#[must_use]
pub fn granularity_for(range: &TimeRange) -> Granularity {
    match (range.start, range.end) {
        (Some(start), Some(end)) => select_granularity(&start, &end),
        _ => Granularity::Year,
    }
}

/// Returns `true` if every present bound falls on a UTC day boundary:
/// a start at exactly `00:00:00` and an end at `23:59:59`.
#[must_use]
pub fn is_day_aligned(range: &TimeRange) -> bool {
    range.start.is_none_or(|start| is_start_of_day(&start))
        && range.end.is_none_or(|end| is_end_of_day(&end))
}

fn is_start_of_day(at: &DateTime<Utc>) -> bool {
    at.hour() == 0 && at.minute() == 0 && at.second() == 0 && at.nanosecond() == 0
}

fn is_end_of_day(at: &DateTime<Utc>) -> bool {
    at.hour() == 23 && at.minute() == 59 && at.second() == 59
}

fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.succ_opt().is_none_or(|next| next.month() != date.month())
}
