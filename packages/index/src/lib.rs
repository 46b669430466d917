#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Precomputed daily count indexes.
//!
//! The offline builders in [`builder`] scan the whole corpus once per refresh
//! and write `{YYYY-MM-DD: count}` and `{YYYY-MM-DD: {value: count}}` JSON
//! files below `data-aggregation/`. [`cache::IndexStore`] reads them back
//! lazily for the aggregation fast path. Borough assignment for the borough
//! index uses the R-tree backed [`boundaries::BoroughLocator`].

pub mod boundaries;
pub mod builder;
pub mod cache;
pub mod daily;
pub mod progress;

/// Errors that can occur while building, reading or writing indexes.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Boundary file could not be interpreted.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Corpus read failed.
    #[error("Store error: {0}")]
    Store(#[from] stop_search_store::StoreError),

    /// Boundary file parsed but was not usable.
    #[error("Invalid boundaries: {message}")]
    Boundaries {
        /// Description of what went wrong.
        message: String,
    },
}
