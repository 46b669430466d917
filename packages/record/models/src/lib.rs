#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Stop-and-search record types shared across the whole toolchain.
//!
//! Records are deserialized from the monthly shard files published by the
//! police data feed (snake_case field names). Filtering and grouping reach
//! into a record through the closed [`RecordField`] set rather than by
//! arbitrary property name, so every filterable field is known at compile
//! time.

pub mod normalized;
pub mod time;

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Separator between the borough prefix and the street description in the
/// feed's street names (e.g. `"Camden - On or near High Street"`).
pub const STREET_BOROUGH_SEPARATOR: &str = " - ";

/// Label used when a record has no value for the dimension being grouped.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Outcome reference attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeObject {
    /// Outcome code.
    pub id: String,
    /// Human-readable outcome name.
    pub name: String,
}

/// Street descriptor of a record's location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Street {
    /// Street identifier assigned by the feed.
    pub id: i64,
    /// Street name, usually prefixed with the borough.
    pub name: String,
}

/// Approximate location of a stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude as published (numeric string).
    pub latitude: String,
    /// Longitude as published (numeric string).
    pub longitude: String,
    /// Street descriptor.
    pub street: Option<Street>,
}

impl Location {
    /// Parses the published coordinates into `(latitude, longitude)`.
    ///
    /// Returns `None` if either coordinate is missing, unparseable, or zero.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let latitude = self.latitude.trim().parse::<f64>().ok()?;
        let longitude = self.longitude.trim().parse::<f64>().ok()?;
        if latitude == 0.0 || longitude == 0.0 {
            return None;
        }
        Some((latitude, longitude))
    }
}

/// One observed stop-and-search event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopSearchRecord {
    /// When the stop happened (ISO 8601).
    #[serde(default)]
    pub datetime: String,
    /// Age bracket, e.g. `"18-24"`.
    pub age_range: Option<String>,
    /// Ethnicity as recorded by the officer.
    pub officer_defined_ethnicity: Option<String>,
    /// Ethnicity as stated by the person stopped.
    pub self_defined_ethnicity: Option<String>,
    /// Gender.
    pub gender: Option<String>,
    /// Legislation the search was performed under.
    pub legislation: Option<String>,
    /// Outcome description.
    pub outcome: Option<String>,
    /// What the officer was searching for.
    pub object_of_search: Option<String>,
    /// Search type (person, vehicle, ...).
    #[serde(rename = "type")]
    pub search_type: Option<String>,
    /// Name of the policing operation, if any.
    pub operation_name: Option<String>,
    /// Borough assigned by the enrichment step.
    #[serde(default)]
    pub borough: Option<String>,
    /// Whether a person (rather than only a vehicle) was involved.
    pub involved_person: Option<bool>,
    /// Whether the outcome was linked to the object of search.
    pub outcome_linked_to_object_of_search: Option<bool>,
    /// Whether more than outer clothing was removed.
    pub removal_of_more_than_outer_clothing: Option<bool>,
    /// Whether the stop was part of an operation.
    pub operation: Option<bool>,
    /// Structured outcome reference.
    #[serde(default)]
    pub outcome_object: Option<OutcomeObject>,
    /// Approximate location.
    #[serde(default)]
    pub location: Option<Location>,
}

impl StopSearchRecord {
    /// Returns the borough for this record.
    ///
    /// Prefers the explicit `borough` field; otherwise takes the segment of
    /// the street name before [`STREET_BOROUGH_SEPARATOR`].
    #[must_use]
    pub fn derived_borough(&self) -> Option<&str> {
        if let Some(borough) = self.borough.as_deref()
            && !borough.is_empty()
        {
            return Some(borough);
        }
        self.street_borough()
    }

    /// Borough guessed from the street-name prefix alone.
    #[must_use]
    pub fn street_borough(&self) -> Option<&str> {
        let name = self.location.as_ref()?.street.as_ref()?.name.as_str();
        let prefix = name
            .split(STREET_BOROUGH_SEPARATOR)
            .next()
            .unwrap_or_default()
            .trim();
        if prefix.is_empty() { None } else { Some(prefix) }
    }

    /// Reads the value of `field` from this record.
    #[must_use]
    pub fn value(&self, field: RecordField) -> FieldValue<'_> {
        match field {
            RecordField::Datetime => FieldValue::text(Some(self.datetime.as_str())),
            RecordField::AgeRange => FieldValue::text(self.age_range.as_deref()),
            RecordField::OfficerDefinedEthnicity => {
                FieldValue::text(self.officer_defined_ethnicity.as_deref())
            }
            RecordField::SelfDefinedEthnicity => {
                FieldValue::text(self.self_defined_ethnicity.as_deref())
            }
            RecordField::Gender => FieldValue::text(self.gender.as_deref()),
            RecordField::Legislation => FieldValue::text(self.legislation.as_deref()),
            RecordField::Outcome => FieldValue::text(self.outcome.as_deref()),
            RecordField::ObjectOfSearch => FieldValue::text(self.object_of_search.as_deref()),
            RecordField::Type => FieldValue::text(self.search_type.as_deref()),
            RecordField::OperationName => FieldValue::text(self.operation_name.as_deref()),
            RecordField::Borough => FieldValue::text(self.derived_borough()),
            RecordField::InvolvedPerson => FieldValue::flag(self.involved_person),
            RecordField::OutcomeLinkedToObjectOfSearch => {
                FieldValue::flag(self.outcome_linked_to_object_of_search)
            }
            RecordField::RemovalOfMoreThanOuterClothing => {
                FieldValue::flag(self.removal_of_more_than_outer_clothing)
            }
            RecordField::Operation => FieldValue::flag(self.operation),
            RecordField::OutcomeObject => self
                .outcome_object
                .as_ref()
                .and_then(|o| serde_json::to_string(o).ok())
                .map_or(FieldValue::Missing, FieldValue::Structured),
            RecordField::Location => self
                .location
                .as_ref()
                .and_then(|l| serde_json::to_string(l).ok())
                .map_or(FieldValue::Missing, FieldValue::Structured),
        }
    }
}

/// The closed set of record fields that can be filtered or grouped on.
///
/// Parses from the feed's snake_case names as well as the camelCase names
/// used by the dashboard front end.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordField {
    /// Event timestamp.
    Datetime,
    /// Age bracket.
    #[strum(to_string = "age_range", serialize = "ageRange")]
    AgeRange,
    /// Officer-defined ethnicity.
    #[strum(
        to_string = "officer_defined_ethnicity",
        serialize = "officerDefinedEthnicity",
        serialize = "ethnicity"
    )]
    OfficerDefinedEthnicity,
    /// Self-defined ethnicity.
    #[strum(to_string = "self_defined_ethnicity", serialize = "selfDefinedEthnicity")]
    SelfDefinedEthnicity,
    /// Gender.
    Gender,
    /// Legislation.
    Legislation,
    /// Outcome description.
    Outcome,
    /// Object of search.
    #[strum(to_string = "object_of_search", serialize = "objectOfSearch")]
    ObjectOfSearch,
    /// Search type.
    Type,
    /// Operation name.
    #[strum(to_string = "operation_name", serialize = "operationName")]
    OperationName,
    /// Borough (explicit or derived from the street name).
    Borough,
    /// Involved-person flag.
    #[strum(to_string = "involved_person", serialize = "involvedPerson")]
    InvolvedPerson,
    /// Outcome-linked flag.
    #[strum(
        to_string = "outcome_linked_to_object_of_search",
        serialize = "outcomeLinkedToObjectOfSearch"
    )]
    OutcomeLinkedToObjectOfSearch,
    /// Clothing-removal flag.
    #[strum(
        to_string = "removal_of_more_than_outer_clothing",
        serialize = "removalOfMoreThanOuterClothing"
    )]
    RemovalOfMoreThanOuterClothing,
    /// Operation flag.
    Operation,
    /// Structured outcome reference.
    #[strum(to_string = "outcome_object", serialize = "outcomeObject")]
    OutcomeObject,
    /// Structured location.
    Location,
}

impl RecordField {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Datetime,
            Self::AgeRange,
            Self::OfficerDefinedEthnicity,
            Self::SelfDefinedEthnicity,
            Self::Gender,
            Self::Legislation,
            Self::Outcome,
            Self::ObjectOfSearch,
            Self::Type,
            Self::OperationName,
            Self::Borough,
            Self::InvolvedPerson,
            Self::OutcomeLinkedToObjectOfSearch,
            Self::RemovalOfMoreThanOuterClothing,
            Self::Operation,
            Self::OutcomeObject,
            Self::Location,
        ]
    }
}

/// A field value read from a record through [`StopSearchRecord::value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue<'a> {
    /// Null or absent.
    Missing,
    /// Categorical string.
    Text(&'a str),
    /// Boolean flag.
    Flag(bool),
    /// Structured value rendered as JSON.
    Structured(String),
}

impl<'a> FieldValue<'a> {
    fn text(value: Option<&'a str>) -> Self {
        value.map_or(Self::Missing, Self::Text)
    }

    fn flag(value: Option<bool>) -> Self {
        value.map_or(Self::Missing, Self::Flag)
    }

    /// Stringifies the value for set-membership filtering.
    ///
    /// Missing values become the empty string and flags become
    /// `"true"`/`"false"`.
    #[must_use]
    pub fn as_filter_str(&self) -> Cow<'a, str> {
        match self {
            Self::Missing => Cow::Borrowed(""),
            Self::Text(s) => Cow::Borrowed(*s),
            Self::Flag(true) => Cow::Borrowed("true"),
            Self::Flag(false) => Cow::Borrowed("false"),
            Self::Structured(json) => Cow::Owned(json.clone()),
        }
    }

    /// Label used when grouping by this value. Missing and empty values
    /// fold into [`UNKNOWN_LABEL`].
    #[must_use]
    pub fn group_label(&self) -> Cow<'a, str> {
        match self.as_filter_str() {
            s if s.is_empty() => Cow::Borrowed(UNKNOWN_LABEL),
            s => s,
        }
    }
}

/// A record paired with its parsed timestamp.
///
/// Stores parse timestamps once at load time so scans never re-parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedRecord {
    /// Parsed event time (UTC).
    pub occurred_at: DateTime<Utc>,
    /// The deserialized record.
    pub record: StopSearchRecord,
}

impl TimedRecord {
    /// Pairs a record with its parsed timestamp.
    ///
    /// # Errors
    ///
    /// Returns the record back if its `datetime` cannot be parsed.
    pub fn from_record(record: StopSearchRecord) -> Result<Self, StopSearchRecord> {
        match time::parse_timestamp(&record.datetime) {
            Some(occurred_at) => Ok(Self {
                occurred_at,
                record,
            }),
            None => Err(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_street(name: &str) -> StopSearchRecord {
        StopSearchRecord {
            location: Some(Location {
                latitude: "51.5".to_string(),
                longitude: "-0.12".to_string(),
                street: Some(Street {
                    id: 1,
                    name: name.to_string(),
                }),
            }),
            ..StopSearchRecord::default()
        }
    }

    #[test]
    fn deserializes_feed_record() {
        let json = r#"{
            "age_range": "18-24",
            "outcome": "A no further action disposal",
            "involved_person": true,
            "self_defined_ethnicity": null,
            "gender": "Male",
            "legislation": "Misuse of Drugs Act 1971 (section 23)",
            "outcome_linked_to_object_of_search": null,
            "datetime": "2023-06-10T12:00:00+00:00",
            "removal_of_more_than_outer_clothing": false,
            "outcome_object": {"id": "bu-no-further-action", "name": "A no further action disposal"},
            "location": {"latitude": "51.5", "street": {"id": 7, "name": "Camden - On or near Park Way"}, "longitude": "-0.14"},
            "operation": false,
            "officer_defined_ethnicity": "White",
            "type": "Person search",
            "operation_name": null,
            "object_of_search": "Controlled drugs"
        }"#;
        let record: StopSearchRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.search_type.as_deref(), Some("Person search"));
        assert_eq!(record.borough, None);
        assert_eq!(record.derived_borough(), Some("Camden"));
    }

    #[test]
    fn explicit_borough_wins_over_street_prefix() {
        let mut record = with_street("Camden - On or near Park Way");
        record.borough = Some("Islington".to_string());
        assert_eq!(record.derived_borough(), Some("Islington"));
    }

    #[test]
    fn empty_borough_falls_back_to_street() {
        let mut record = with_street("Hackney - On or near Mare Street");
        record.borough = Some(String::new());
        assert_eq!(record.derived_borough(), Some("Hackney"));
    }

    #[test]
    fn street_without_separator_uses_whole_name() {
        let record = with_street("On or near Mare Street");
        assert_eq!(record.street_borough(), Some("On or near Mare Street"));
    }

    #[test]
    fn stringifies_values_for_filtering() {
        let record = StopSearchRecord {
            gender: Some("Female".to_string()),
            involved_person: Some(true),
            operation: Some(false),
            ..StopSearchRecord::default()
        };
        assert_eq!(record.value(RecordField::Gender).as_filter_str(), "Female");
        assert_eq!(
            record.value(RecordField::InvolvedPerson).as_filter_str(),
            "true"
        );
        assert_eq!(record.value(RecordField::Operation).as_filter_str(), "false");
        assert_eq!(record.value(RecordField::AgeRange).as_filter_str(), "");
        assert_eq!(record.value(RecordField::AgeRange).group_label(), UNKNOWN_LABEL);
    }

    #[test]
    fn parses_field_names_in_both_cases() {
        assert_eq!(
            "age_range".parse::<RecordField>().unwrap(),
            RecordField::AgeRange
        );
        assert_eq!(
            "ageRange".parse::<RecordField>().unwrap(),
            RecordField::AgeRange
        );
        assert_eq!(
            "ethnicity".parse::<RecordField>().unwrap(),
            RecordField::OfficerDefinedEthnicity
        );
        assert_eq!(RecordField::AgeRange.to_string(), "age_range");
        assert!("shoe_size".parse::<RecordField>().is_err());
    }

    #[test]
    fn every_field_round_trips_through_display() {
        for field in RecordField::all() {
            assert_eq!(field.to_string().parse::<RecordField>().unwrap(), *field);
        }
    }

    #[test]
    fn rejects_zero_coordinates() {
        let location = Location {
            latitude: "0".to_string(),
            longitude: "-0.12".to_string(),
            street: None,
        };
        assert!(location.coordinates().is_none());
    }

    #[test]
    fn timed_record_returns_unparseable_record() {
        let record = StopSearchRecord {
            datetime: "yesterday".to_string(),
            ..StopSearchRecord::default()
        };
        assert!(TimedRecord::from_record(record).is_err());
    }
}
