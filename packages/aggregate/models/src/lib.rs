#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation result types and the query contract.
//!
//! Request types carry the raw strings a caller sends (`dateStart`,
//! `dateEnd`) and the per-field filter values. Response types serialize to the camelCase
//! JSON shapes the dashboard charts consume. They are separate from the
//! engine internals so the contract can evolve independently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stop_search_record_models::RecordField;
use strum_macros::{AsRefStr, Display, EnumString};

/// Error returned when a filter names a field outside [`RecordField`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown record field '{name}'")]
pub struct UnknownFieldError {
    /// The name that failed to parse.
    pub name: String,
}

/// Parses a field name into a [`RecordField`].
///
/// # Errors
///
/// Returns [`UnknownFieldError`] if `name` is not a supported field.
pub fn parse_field(name: &str) -> Result<RecordField, UnknownFieldError> {
    name.trim().parse().map_err(|_| UnknownFieldError {
        name: name.to_string(),
    })
}

/// Mapping from field to the set of allowed values.
///
/// Fields are combined with AND, values within a field with OR. A field
/// with an empty value list is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterMap(BTreeMap<RecordField, Vec<String>>);

impl FilterMap {
    /// Creates an empty (unconstrained) filter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds allowed values for `field`, merging with any already present.
    pub fn allow<I, S>(&mut self, field: RecordField, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.0.entry(field).or_default();
        for value in values {
            let value = value.into();
            if !entry.contains(&value) {
                entry.push(value);
            }
        }
    }

    /// Builder-style [`Self::allow`].
    #[must_use]
    pub fn with<I, S>(mut self, field: RecordField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow(field, values);
        self
    }

    /// Iterates the fields that actually constrain records (non-empty
    /// value lists).
    pub fn active(&self) -> impl Iterator<Item = (RecordField, &[String])> {
        self.0
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(field, values)| (*field, values.as_slice()))
    }

    /// Returns `true` if no field constrains records.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.active().next().is_none()
    }
}

/// Splits a comma-separated value list, trimming each entry.
#[must_use]
pub fn split_csv(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).collect()
}

/// Time-bucketing level chosen for a date range.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Granularity {
    /// A single bucket with the overall count.
    Total,
    /// One bucket per day of a month.
    Day,
    /// One bucket per month of a year.
    Month,
    /// One bucket per calendar year touched by the range.
    Year,
}

/// One labeled count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// Display label (`"Total"`, day number, month abbreviation, year).
    pub label: String,
    /// Number of records in this bucket.
    pub value: u64,
    /// Machine key: `YYYY-MM-DD`, `YYYY-MM` or `YYYY`.
    #[serde(rename = "date", default, skip_serializing_if = "Option::is_none")]
    pub iso_key: Option<String>,
}

/// Grouped counts for a date range.
///
/// `total_records` always equals the sum of bucket values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    /// Chosen granularity.
    pub aggregation_type: Granularity,
    /// Buckets in chronological order.
    pub buckets: Vec<Bucket>,
    /// Count of records passing the predicate inside the range.
    pub total_records: u64,
}

/// Categorical dimensions with their own total queries and precomputed
/// indexes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CategoryDimension {
    /// Officer-defined ethnicity.
    Ethnicity,
    /// Borough.
    Borough,
    /// Age range.
    AgeRange,
}

impl CategoryDimension {
    /// The record field this dimension groups by.
    #[must_use]
    pub const fn field(self) -> RecordField {
        match self {
            Self::Ethnicity => RecordField::OfficerDefinedEthnicity,
            Self::Borough => RecordField::Borough,
            Self::AgeRange => RecordField::AgeRange,
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Ethnicity, Self::Borough, Self::AgeRange]
    }
}

/// Raw date bounds as sent by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeParams {
    /// Start bound (ISO 8601).
    pub date_start: Option<String>,
    /// End bound (ISO 8601).
    pub date_end: Option<String>,
}

impl RangeParams {
    /// Creates bounds from optional strings.
    #[must_use]
    pub fn new(date_start: Option<&str>, date_end: Option<&str>) -> Self {
        Self {
            date_start: date_start.map(ToString::to_string),
            date_end: date_end.map(ToString::to_string),
        }
    }
}

/// Time-series aggregation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedQuery {
    /// Date bounds (both required).
    pub range: RangeParams,
    /// Categorical filters.
    pub filters: FilterMap,
}

/// Category-total request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryQuery {
    /// Optional date bounds.
    pub range: RangeParams,
    /// Categorical filters.
    pub filters: FilterMap,
}

/// Plain total request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TotalQuery {
    /// Optional date bounds; applied only when both are present.
    pub range: RangeParams,
    /// Field for the single-field match.
    pub filter_field: Option<String>,
    /// Value for the single-field match.
    pub filter_value: Option<String>,
    /// Categorical cross filters.
    pub filters: FilterMap,
}

/// Echo of the requested range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeEcho {
    /// Requested start.
    pub start: String,
    /// Requested end.
    pub end: String,
}

/// Response of the time-series aggregation query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResponse {
    /// Chosen granularity.
    pub aggregation_type: Granularity,
    /// Buckets in chronological order.
    pub data: Vec<Bucket>,
    /// Count of matching records.
    pub total_records: u64,
    /// Requested range.
    pub date_range: DateRangeEcho,
}

/// Response of the ethnicity and borough total queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotalsResponse {
    /// Count per category value.
    pub totals: BTreeMap<String, u64>,
}

/// Response of the age-range query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeRangeResponse {
    /// Count per age range.
    pub data: BTreeMap<String, u64>,
    /// Requested start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_start: Option<String>,
    /// Requested end.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_end: Option<String>,
}

/// Response of the plain total query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalResponse {
    /// Matching record count.
    pub total: u64,
    /// Requested start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_start: Option<String>,
    /// Requested end.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_end: Option<String>,
    /// Single-match field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_field: Option<String>,
    /// Single-match value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_value: Option<String>,
}

/// Which corpus statistics to compute.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StatsKind {
    /// Total record count only.
    Total,
    /// Per-month counts only.
    ByMonth,
    /// Both.
    #[default]
    All,
}

/// Corpus statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// Records across all shards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_records: Option<u64>,
    /// Count per `YYYY-MM`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_by_month: Option<BTreeMap<String, u64>>,
}

/// Shard listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFiles {
    /// Number of shards.
    pub count: usize,
    /// Shard names (`YYYY-MM`).
    pub files: Vec<String>,
}

/// Corpus inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResponse {
    /// Available shards.
    pub data_files: DataFiles,
    /// Records across all shards.
    pub total_records: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_list_is_unconstrained() {
        let map = FilterMap::new().with(RecordField::OfficerDefinedEthnicity, Vec::<String>::new());
        assert!(map.is_unconstrained());
        assert!(!FilterMap::new().with(RecordField::Borough, ["Camden"]).is_unconstrained());
    }

    #[test]
    fn repeated_fields_merge_without_duplicates() {
        let mut map = FilterMap::new();
        map.allow(RecordField::Borough, split_csv("Camden, Hackney"));
        map.allow(RecordField::AgeRange, ["18-24"]);
        map.allow(RecordField::Borough, ["Islington", "Camden"]);

        let active: Vec<_> = map.active().collect();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].0, RecordField::AgeRange);
        assert_eq!(active[1].1, ["Camden", "Hackney", "Islington"]);
    }

    #[test]
    fn rejects_unknown_field_names() {
        assert_eq!(parse_field("shoe_size").unwrap_err().name, "shoe_size");
        assert_eq!(parse_field(" ageRange ").unwrap(), RecordField::AgeRange);
    }

    #[test]
    fn bucket_serializes_key_as_date() {
        let bucket = Bucket {
            label: "10".to_string(),
            value: 2,
            iso_key: Some("2023-06-10".to_string()),
        };
        let json = serde_json::to_value(&bucket).unwrap();
        assert_eq!(json["date"], "2023-06-10");
        let total = Bucket {
            label: "Total".to_string(),
            value: 2,
            iso_key: None,
        };
        assert!(serde_json::to_value(&total).unwrap().get("date").is_none());
    }

    #[test]
    fn granularity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(Granularity::Month).unwrap(),
            serde_json::json!("month")
        );
        assert_eq!(Granularity::Day.to_string(), "day");
    }
}
