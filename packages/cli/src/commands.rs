//! Subcommand implementations.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use stop_search_aggregate::service::QueryService;
use stop_search_aggregate_models::{
    AggregatedQuery, CategoryQuery, FilterMap, RangeParams, TotalQuery, parse_field, split_csv,
};
use stop_search_cli_utils::{IndicatifProgress, MultiProgress};
use stop_search_index::boundaries::BoroughLocator;
use stop_search_index::builder::build_from_store;
use stop_search_index::cache::IndexStore;
use stop_search_record_models::time::TimeRange;
use stop_search_store::RecordStore;
use stop_search_store::memory::MemoryStore;
use stop_search_store::normalize::write_normalized;
use stop_search_store::paths::DataPaths;
use stop_search_store::shard::ShardStore;

use crate::QueryArgs;

impl QueryArgs {
    fn range(&self) -> RangeParams {
        RangeParams::new(self.start.as_deref(), self.end.as_deref())
    }

    fn filter_map(&self) -> Result<FilterMap, Box<dyn Error>> {
        let mut map = FilterMap::new();
        for filter in &self.filters {
            let (field, values) = filter
                .split_once('=')
                .ok_or_else(|| format!("Filter '{filter}' must look like field=a,b"))?;
            map.allow(parse_field(field)?, split_csv(values));
        }
        Ok(map)
    }

    pub fn aggregated(&self) -> Result<AggregatedQuery, Box<dyn Error>> {
        Ok(AggregatedQuery {
            range: self.range(),
            filters: self.filter_map()?,
        })
    }

    pub fn category(&self) -> Result<CategoryQuery, Box<dyn Error>> {
        Ok(CategoryQuery {
            range: self.range(),
            filters: self.filter_map()?,
        })
    }

    pub fn total(
        &self,
        filter_field: Option<String>,
        filter_value: Option<String>,
    ) -> Result<TotalQuery, Box<dyn Error>> {
        Ok(TotalQuery {
            range: self.range(),
            filter_field,
            filter_value,
            filters: self.filter_map()?,
        })
    }
}

/// Opens the record store (shards or normalized corpus), the borough
/// boundaries when present and, unless disabled, the index cache.
pub fn service(
    paths: &DataPaths,
    normalized: bool,
    use_index: bool,
    boundaries: &Path,
) -> Result<QueryService, Box<dyn Error>> {
    let store: Arc<dyn RecordStore> = if normalized {
        Arc::new(MemoryStore::load_normalized(&paths.normalized_path())?)
    } else {
        let dir = paths.shard_dir();
        log::info!("Reading shards from {}", dir.display());
        Arc::new(ShardStore::new(dir))
    };

    let mut service = QueryService::new(store);
    if let Some(locator) = load_locator(boundaries) {
        service = service.with_boroughs(Arc::new(locator));
    }
    if use_index {
        Ok(service.with_indexes(Arc::new(IndexStore::new(paths.aggregation_dir()))))
    } else {
        Ok(service)
    }
}

/// Prints a response as pretty JSON on stdout.
pub fn print<T: Serialize>(response: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

/// Loads the borough boundaries at `path`.
///
/// Returns `None` (boroughs then come from street names) when the file is
/// missing or unreadable.
fn load_locator(path: &Path) -> Option<BoroughLocator> {
    if !path.is_file() {
        log::warn!(
            "Borough boundaries {} not found; using street names only",
            path.display()
        );
        return None;
    }
    match BoroughLocator::load(path) {
        Ok(locator) => Some(locator),
        Err(e) => {
            log::warn!("Ignoring borough boundaries {}: {e}", path.display());
            None
        }
    }
}

/// Rebuilds every precomputed index from the shard directory.
pub fn build_index(
    paths: &DataPaths,
    boundaries: &Path,
    multi: &MultiProgress,
) -> Result<(), Box<dyn Error>> {
    let locator = load_locator(boundaries);

    let store = ShardStore::new(paths.shard_dir());
    let progress = IndicatifProgress::shards_bar(multi, "Building indexes");
    let set = build_from_store(&store, locator.as_ref(), progress.as_ref())?;
    set.write(&paths.aggregation_dir())?;
    Ok(())
}

/// Writes the normalized corpus built from the shard directory.
pub fn normalize(paths: &DataPaths, output: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let store = ShardStore::new(paths.shard_dir());
    let chunks = store.chunks(&TimeRange::unbounded())?;
    let corpus = stop_search_store::normalize::normalize(
        chunks
            .iter()
            .flat_map(|chunk| chunk.iter().map(|timed| &timed.record)),
    );

    let output = output.unwrap_or_else(|| paths.normalized_path());
    write_normalized(&output, &corpus)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stop_search_record_models::RecordField;

    fn args(filters: &[&str]) -> QueryArgs {
        QueryArgs {
            start: Some("2023-06-01".to_string()),
            end: None,
            filters: filters.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn parses_repeated_filters() {
        let query = args(&["borough=Camden,Hackney", "ageRange=18-24", "borough=Islington"])
            .aggregated()
            .unwrap();
        let active: Vec<_> = query.filters.active().collect();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].0, RecordField::AgeRange);
        assert_eq!(active[1].1, ["Camden", "Hackney", "Islington"]);
        assert_eq!(query.range.date_start.as_deref(), Some("2023-06-01"));
        assert!(query.range.date_end.is_none());
    }

    #[test]
    fn missing_boundaries_fall_back_to_street_names() {
        let tmp = std::env::temp_dir().join("stop_search_cli_no_boundaries.geojson");
        let _ = std::fs::remove_file(&tmp);
        assert!(load_locator(&tmp).is_none());

        std::fs::write(&tmp, "not geojson").unwrap();
        assert!(load_locator(&tmp).is_none());

        std::fs::write(
            &tmp,
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"name":"Islington"},"geometry":{"type":"Polygon","coordinates":[[[-0.2,51.5],[0.0,51.5],[0.0,51.6],[-0.2,51.6],[-0.2,51.5]]]}}]}"#,
        )
        .unwrap();
        assert_eq!(load_locator(&tmp).map(|l| l.len()), Some(1));

        let _ = std::fs::remove_file(&tmp);
    }

    #[test]
    fn rejects_malformed_filters() {
        assert!(args(&["borough"]).category().is_err());
        assert!(args(&["shoe_size=9"]).category().is_err());
    }
}
