//! Record predicates built from request parameters.

use std::sync::Arc;

use stop_search_aggregate_models::{FilterMap, RangeParams, UnknownFieldError, parse_field};
use stop_search_index::boundaries::BoroughLocator;
use stop_search_index::builder::assigned_borough;
use stop_search_record_models::time::{BoundSide, TimeRange, parse_bound};
use stop_search_record_models::{FieldValue, RecordField, StopSearchRecord, TimedRecord};

use crate::QueryError;

/// Parses raw bounds into a [`TimeRange`]. Absent or empty strings leave
/// that side unbounded.
///
/// # Errors
///
/// Returns [`QueryError::InvalidDate`] if a present bound does not parse.
pub fn parse_range(params: &RangeParams) -> Result<TimeRange, QueryError> {
    Ok(TimeRange::new(
        parse_side(params.date_start.as_deref(), BoundSide::Start)?,
        parse_side(params.date_end.as_deref(), BoundSide::End)?,
    ))
}

fn parse_side(
    value: Option<&str>,
    side: BoundSide,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, QueryError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_bound(s, side)
            .map(Some)
            .ok_or_else(|| QueryError::InvalidDate {
                value: s.to_string(),
            }),
    }
}

/// Date range plus categorical constraints, evaluated per record.
///
/// A record passes when its timestamp is inside the range and, for every
/// active field, its stringified value is one of the allowed values.
/// Borough values are read through [`assigned_borough`], using the borough
/// locator when one is attached.
#[derive(Clone)]
pub struct Predicate {
    range: TimeRange,
    constraints: Vec<(RecordField, Vec<String>)>,
    boroughs: Option<Arc<BoroughLocator>>,
}

impl Predicate {
    /// Builds a predicate. Fields with no allowed values are dropped.
    #[must_use]
    pub fn new(range: TimeRange, filters: &FilterMap) -> Self {
        Self {
            range,
            constraints: filters
                .active()
                .map(|(field, values)| (field, values.to_vec()))
                .collect(),
            boroughs: None,
        }
    }

    /// Assigns boroughs with `locator` instead of the street name alone.
    #[must_use]
    pub fn with_boroughs(mut self, locator: Option<Arc<BoroughLocator>>) -> Self {
        self.boroughs = locator;
        self
    }

    /// The date range being tested.
    #[must_use]
    pub const fn range(&self) -> &TimeRange {
        &self.range
    }

    /// Reads `field` from `record`.
    #[must_use]
    pub fn value<'a>(&'a self, record: &'a StopSearchRecord, field: RecordField) -> FieldValue<'a> {
        match field {
            RecordField::Borough => assigned_borough(record, self.boroughs.as_deref())
                .map_or(FieldValue::Missing, FieldValue::Text),
            _ => record.value(field),
        }
    }

    /// Tests one record.
    #[must_use]
    pub fn matches(&self, timed: &TimedRecord) -> bool {
        self.range.contains(&timed.occurred_at) && self.matches_fields(&timed.record)
    }

    /// Tests only the categorical constraints.
    #[must_use]
    pub fn matches_fields(&self, record: &StopSearchRecord) -> bool {
        self.constraints.iter().all(|(field, allowed)| {
            let value = self.value(record, *field).as_filter_str();
            allowed.iter().any(|a| *a == value)
        })
    }
}

/// Loose single-field match used by the plain total query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    field: RecordField,
    value: String,
    lowered: String,
}

impl FieldMatch {
    /// Creates a match of `value` against the field named `field`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownFieldError`] if `field` is not a supported field.
    pub fn parse(field: &str, value: &str) -> Result<Self, UnknownFieldError> {
        Ok(Self {
            field: parse_field(field)?,
            value: value.to_string(),
            lowered: value.to_lowercase(),
        })
    }

    /// The matched field.
    #[must_use]
    pub const fn field(&self) -> RecordField {
        self.field
    }

    /// Tests a value read from [`Self::field`].
    ///
    /// * missing values match `"null"` or the empty string
    /// * booleans match `"true"` / `"false"` exactly
    /// * structured values match if their JSON contains the value
    /// * text matches by case-insensitive substring
    #[must_use]
    pub fn matches(&self, value: &FieldValue<'_>) -> bool {
        match value {
            FieldValue::Missing => self.value == "null" || self.value.is_empty(),
            FieldValue::Flag(flag) => self.value == if *flag { "true" } else { "false" },
            FieldValue::Structured(json) => json.contains(&self.value),
            FieldValue::Text(text) => text.to_lowercase().contains(&self.lowered),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stop_search_record_models::time::parse_timestamp;
    use stop_search_record_models::{Location, Street};

    fn timed(datetime: &str, borough: Option<&str>) -> TimedRecord {
        TimedRecord::from_record(StopSearchRecord {
            datetime: datetime.to_string(),
            borough: borough.map(ToString::to_string),
            ..StopSearchRecord::default()
        })
        .unwrap()
    }

    #[test]
    fn borough_filter_selects_exact_value() {
        let camden = timed("2023-06-10T10:00:00Z", Some("Camden"));
        let hackney = timed("2023-06-10T10:00:00Z", Some("Hackney"));
        let predicate = Predicate::new(
            TimeRange::unbounded(),
            &FilterMap::new().with(RecordField::Borough, ["Camden"]),
        );
        assert!(predicate.matches(&camden));
        assert!(!predicate.matches(&hackney));
    }

    #[test]
    fn values_within_a_field_are_ored() {
        let predicate = Predicate::new(
            TimeRange::unbounded(),
            &FilterMap::new().with(RecordField::Borough, ["Camden", "Hackney"]),
        );
        assert!(predicate.matches(&timed("2023-06-10T10:00:00Z", Some("Hackney"))));
        assert!(!predicate.matches(&timed("2023-06-10T10:00:00Z", None)));
    }

    #[test]
    fn empty_value_list_matches_everything() {
        let predicate = Predicate::new(
            TimeRange::unbounded(),
            &FilterMap::new().with(RecordField::OfficerDefinedEthnicity, Vec::<String>::new()),
        );
        assert!(predicate.matches(&timed("2023-06-10T10:00:00Z", None)));
    }

    #[test]
    fn missing_value_matches_empty_string() {
        let predicate = Predicate::new(
            TimeRange::unbounded(),
            &FilterMap::new().with(RecordField::Gender, [""]),
        );
        assert!(predicate.matches(&timed("2023-06-10T10:00:00Z", None)));
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let predicate = Predicate::new(
            TimeRange::new(
                parse_timestamp("2023-06-10T10:00:00Z"),
                parse_timestamp("2023-06-10T12:00:00Z"),
            ),
            &FilterMap::new(),
        );
        assert!(predicate.matches(&timed("2023-06-10T10:00:00Z", None)));
        assert!(predicate.matches(&timed("2023-06-10T12:00:00Z", None)));
        assert!(!predicate.matches(&timed("2023-06-10T12:00:01Z", None)));
    }

    #[test]
    fn parses_range_params() {
        let range = parse_range(&RangeParams::new(Some("2023-06-01"), Some("2023-06-30"))).unwrap();
        assert_eq!(
            range.end.unwrap().format("%Y-%m-%dT%H:%M:%S").to_string(),
            "2023-06-30T23:59:59"
        );
        assert_eq!(parse_range(&RangeParams::new(Some(""), None)).unwrap(), TimeRange::unbounded());
        assert!(matches!(
            parse_range(&RangeParams::new(Some("yesterday"), None)),
            Err(QueryError::InvalidDate { value }) if value == "yesterday"
        ));
    }

    #[test]
    fn field_match_rules() {
        let record = StopSearchRecord {
            datetime: "2023-06-10T10:00:00Z".to_string(),
            legislation: Some("Misuse of Drugs Act 1971 (section 23)".to_string()),
            involved_person: Some(true),
            ..StopSearchRecord::default()
        };
        let predicate = Predicate::new(TimeRange::unbounded(), &FilterMap::new());
        let matches = |field: &str, value: &str| {
            let field_match = FieldMatch::parse(field, value).unwrap();
            field_match.matches(&predicate.value(&record, field_match.field()))
        };

        assert!(matches("legislation", "misuse of drugs"));
        assert!(matches("involved_person", "true"));
        assert!(!matches("involved_person", "True"));
        assert!(matches("gender", "null"));
        assert!(!matches("gender", "Male"));
        assert!(FieldMatch::parse("shoe_size", "9").is_err());
    }

    #[test]
    fn borough_filter_uses_attached_locator() {
        let locator = BoroughLocator::from_geojson_str(
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"name":"Islington"},"geometry":{"type":"Polygon","coordinates":[[[-0.2,51.5],[0.0,51.5],[0.0,51.6],[-0.2,51.6],[-0.2,51.5]]]}}]}"#,
        )
        .unwrap();
        let record = StopSearchRecord {
            datetime: "2023-06-10T10:00:00Z".to_string(),
            location: Some(Location {
                latitude: "51.55".to_string(),
                longitude: "-0.1".to_string(),
                street: Some(Street {
                    id: 1,
                    name: "Hackney - On or near High Street".to_string(),
                }),
            }),
            ..StopSearchRecord::default()
        };
        let timed = TimedRecord::from_record(record).unwrap();
        let islington = FilterMap::new().with(RecordField::Borough, ["Islington"]);

        let by_street = Predicate::new(TimeRange::unbounded(), &islington);
        assert!(!by_street.matches(&timed));
        assert_eq!(
            by_street.value(&timed.record, RecordField::Borough),
            FieldValue::Text("Hackney")
        );

        let by_polygon = by_street.with_boroughs(Some(Arc::new(locator)));
        assert!(by_polygon.matches(&timed));
    }
}
