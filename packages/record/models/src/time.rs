//! Timestamp parsing and the inclusive time range used by every query.
//!
//! All instants are normalized to UTC. Timestamps without an offset are
//! interpreted as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of a range a bound string sits on. Only matters for bare
/// dates, which expand to the first or last instant of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    /// Range start.
    Start,
    /// Range end.
    End,
}

/// Parses an ISO 8601 timestamp into UTC.
///
/// Accepts RFC 3339 (`2024-06-01T00:00:00Z`, `2024-06-01T00:00:00+01:00`),
/// offset-less date-times with optional fractional seconds, and bare dates
/// (midnight).
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    parse_with_side(s, BoundSide::Start)
}

/// Parses a range bound. A bare date used as [`BoundSide::End`] expands to
/// the last instant of that day.
#[must_use]
pub fn parse_bound(s: &str, side: BoundSide) -> Option<DateTime<Utc>> {
    parse_with_side(s, side)
}

fn parse_with_side(s: &str, side: BoundSide) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M") {
        return Some(naive.and_utc());
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(match side {
        BoundSide::Start => start_of_day(date),
        BoundSide::End => end_of_day(date),
    })
}

/// First instant of `date` in UTC.
#[must_use]
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Last representable instant of `date` in UTC.
#[must_use]
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_nano_opt(23, 59, 59, 999_999_999)
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN))
        .and_utc()
}

/// Inclusive time range. An absent bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Creates a range from parsed bounds.
    #[must_use]
    pub const fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// A range with no bounds.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Returns `true` if `at` falls inside the range (both ends inclusive).
    #[must_use]
    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| *at >= start) && self.end.is_none_or(|end| *at <= end)
    }

    /// Returns `true` if both bounds are present.
    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// Returns `true` if both bounds are present and `start > end`.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start > end)
    }

    /// Returns `true` if the calendar day `date` overlaps the range.
    #[must_use]
    pub fn overlaps_day(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| end_of_day(date) >= start)
            && self.end.is_none_or(|end| start_of_day(date) <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_with_offset() {
        let dt = parse_timestamp("2023-06-10T00:30:00+01:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2023-06-09T23:30:00+00:00");
    }

    #[test]
    fn parses_offsetless_as_utc() {
        let dt = parse_timestamp("2024-01-15T14:30:00.000").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00 UTC");
        let dt = parse_timestamp("2024-01-15T14:30:00").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00 UTC");
    }

    #[test]
    fn bare_date_expands_by_side() {
        let start = parse_bound("2024-06-30", BoundSide::Start).unwrap();
        let end = parse_bound("2024-06-30", BoundSide::End).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-06-30T00:00:00+00:00");
        assert_eq!(end.format("%H:%M:%S%.9f").to_string(), "23:59:59.999999999");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("not-a-date").is_none());
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("2024-13-01").is_none());
    }

    #[test]
    fn range_contains_is_inclusive() {
        let range = TimeRange::new(
            parse_timestamp("2024-06-01T00:00:00Z"),
            parse_timestamp("2024-06-30T23:59:59Z"),
        );
        assert!(range.contains(&parse_timestamp("2024-06-01T00:00:00Z").unwrap()));
        assert!(range.contains(&parse_timestamp("2024-06-30T23:59:59Z").unwrap()));
        assert!(!range.contains(&parse_timestamp("2024-07-01T00:00:00Z").unwrap()));
        assert!(!range.contains(&parse_timestamp("2024-05-31T23:59:59Z").unwrap()));
    }

    #[test]
    fn unbounded_range_contains_everything() {
        let range = TimeRange::unbounded();
        assert!(range.contains(&parse_timestamp("1970-01-01").unwrap()));
        assert!(!range.is_bounded());
        assert!(!range.is_inverted());
    }

    #[test]
    fn detects_inverted_range() {
        let range = TimeRange::new(
            parse_timestamp("2024-07-01"),
            parse_timestamp("2024-06-01"),
        );
        assert!(range.is_inverted());
    }

    #[test]
    fn overlaps_day_at_edges() {
        let range = TimeRange::new(parse_timestamp("2024-06-10T12:00:00Z"), None);
        assert!(range.overlaps_day(NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()));
        assert!(!range.overlaps_day(NaiveDate::from_ymd_opt(2024, 6, 9).unwrap()));
    }
}
