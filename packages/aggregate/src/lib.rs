#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation over the stop-and-search corpus.
//!
//! [`filter`] turns request parameters into a predicate, [`granularity`]
//! picks the time-bucketing level for a range, [`engine`] scans records into
//! buckets and [`fast_path`] answers the same questions from the
//! precomputed daily indexes when that is equivalent. [`service`] ties these
//! to a [`stop_search_store::RecordStore`] and exposes the query contract.

pub mod engine;
pub mod fast_path;
pub mod filter;
pub mod granularity;
pub mod service;

use stop_search_aggregate_models::UnknownFieldError;
use stop_search_store::StoreError;

/// Errors that reject a query.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// A date bound did not parse.
    #[error("Invalid date '{value}'")]
    InvalidDate {
        /// The offending input.
        value: String,
    },

    /// A required parameter was absent.
    #[error("Missing required parameter '{name}'")]
    MissingParameter {
        /// Parameter name as sent by callers.
        name: &'static str,
    },

    /// Start bound after end bound.
    #[error("Invalid range: start '{start}' is after end '{end}'")]
    InvalidRange {
        /// Requested start.
        start: String,
        /// Requested end.
        end: String,
    },

    /// A filter named a field outside the supported set.
    #[error(transparent)]
    UnknownField(#[from] UnknownFieldError),

    /// The corpus could not be read.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
