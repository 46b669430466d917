//! Query contract over a record store and optional precomputed indexes.
//!
//! Every query parses its raw parameters, rejects malformed or inverted
//! ranges, then answers from an index when [`fast_path::is_eligible`] holds
//! and the index has data in range, otherwise by scanning the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use stop_search_aggregate_models::{
    AgeRangeResponse, AggregatedQuery, AggregatedResponse, CategoryDimension, CategoryQuery,
    CategoryTotalsResponse, DataFiles, DateRangeEcho, FilterMap, InventoryResponse, RangeParams,
    StatsKind, StatsResponse, TotalQuery, TotalResponse,
};
use stop_search_index::boundaries::BoroughLocator;
use stop_search_index::cache::IndexStore;
use stop_search_index::daily::{DailyTotals, MonthlyTotals};
use stop_search_record_models::TimedRecord;
use stop_search_record_models::time::TimeRange;
use stop_search_store::RecordStore;

use crate::QueryError;
use crate::engine::{aggregate_with, category_totals, count, records_by_month};
use crate::fast_path;
use crate::filter::{FieldMatch, Predicate, parse_range};

/// Answers queries against one corpus snapshot.
pub struct QueryService {
    store: Arc<dyn RecordStore>,
    indexes: Option<Arc<IndexStore>>,
    boroughs: Option<Arc<BoroughLocator>>,
}

impl QueryService {
    /// Creates a service that always scans `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            indexes: None,
            boroughs: None,
        }
    }

    /// Enables the index fast path.
    #[must_use]
    pub fn with_indexes(mut self, indexes: Arc<IndexStore>) -> Self {
        self.indexes = Some(indexes);
        self
    }

    /// Assigns boroughs during scans with `locator`, the same way the
    /// index builder does.
    #[must_use]
    pub fn with_boroughs(mut self, locator: Arc<BoroughLocator>) -> Self {
        self.boroughs = Some(locator);
        self
    }

    /// Drops cached shards and indexes.
    pub fn invalidate(&self) {
        self.store.invalidate();
        if let Some(indexes) = &self.indexes {
            indexes.invalidate();
        }
    }

    /// Time-series aggregation. Both bounds are required.
    ///
    /// # Errors
    ///
    /// * [`QueryError::MissingParameter`] if a bound is absent
    /// * [`QueryError::InvalidDate`] if a bound does not parse
    /// * [`QueryError::InvalidRange`] if start is after end
    /// * [`QueryError::Store`] if the store cannot be read
    pub fn aggregated(&self, query: &AggregatedQuery) -> Result<AggregatedResponse, QueryError> {
        let start = required(query.range.date_start.as_deref(), "dateStart")?;
        let end = required(query.range.date_end.as_deref(), "dateEnd")?;
        let range = checked_range(&query.range)?;

        let mut indexed = None;
        if let Some(index) = self.daily_index(&range, &query.filters) {
            indexed = fast_path::aggregate_from_index(&index, &range);
            if indexed.is_none() {
                log::warn!("Daily totals index has no data for {start}..{end}; scanning");
            }
        }
        let result = match indexed {
            Some(result) => {
                log::debug!("Served aggregation {start}..{end} from index");
                result
            }
            None => {
                let chunks = self.store.chunks(&range)?;
                aggregate_with(flatten(&chunks), &self.predicate(range, &query.filters))
            }
        };

        Ok(AggregatedResponse {
            aggregation_type: result.aggregation_type,
            data: result.buckets,
            total_records: result.total_records,
            date_range: DateRangeEcho {
                start: start.to_string(),
                end: end.to_string(),
            },
        })
    }

    /// Plain record count.
    ///
    /// The date range applies only when both bounds are given. The
    /// single-field match applies only when both field and value are given.
    ///
    /// # Errors
    ///
    /// * [`QueryError::InvalidDate`] if a bound does not parse
    /// * [`QueryError::InvalidRange`] if start is after end
    /// * [`QueryError::UnknownField`] if the match field is not supported
    /// * [`QueryError::Store`] if the store cannot be read
    pub fn total(&self, query: &TotalQuery) -> Result<TotalResponse, QueryError> {
        let parsed = checked_range(&query.range)?;
        let range = if parsed.is_bounded() {
            parsed
        } else {
            TimeRange::unbounded()
        };
        let field_match = match (&query.filter_field, &query.filter_value) {
            (Some(field), Some(value)) => Some(FieldMatch::parse(field, value)?),
            _ => None,
        };

        let indexed = if field_match.is_none() {
            self.daily_index(&range, &query.filters)
                .and_then(|index| fast_path::count_from_index(&index, &range))
        } else {
            None
        };
        let total = match indexed {
            Some(total) => total,
            None => {
                let chunks = self.store.chunks(&range)?;
                let predicate = self.predicate(range, &query.filters);
                count(flatten(&chunks), &predicate, field_match.as_ref())
            }
        };

        Ok(TotalResponse {
            total,
            date_start: query.range.date_start.clone(),
            date_end: query.range.date_end.clone(),
            filter_field: query.filter_field.clone(),
            filter_value: query.filter_value.clone(),
        })
    }

    /// Totals per ethnicity or borough.
    ///
    /// # Errors
    ///
    /// * [`QueryError::InvalidDate`] if a bound does not parse
    /// * [`QueryError::InvalidRange`] if start is after end
    /// * [`QueryError::Store`] if the store cannot be read
    pub fn category_totals(
        &self,
        dimension: CategoryDimension,
        query: &CategoryQuery,
    ) -> Result<CategoryTotalsResponse, QueryError> {
        Ok(CategoryTotalsResponse {
            totals: self.grouped(dimension, query)?,
        })
    }

    /// Totals per age range.
    ///
    /// # Errors
    ///
    /// * [`QueryError::InvalidDate`] if a bound does not parse
    /// * [`QueryError::InvalidRange`] if start is after end
    /// * [`QueryError::Store`] if the store cannot be read
    pub fn age_ranges(&self, query: &CategoryQuery) -> Result<AgeRangeResponse, QueryError> {
        Ok(AgeRangeResponse {
            data: self.grouped(CategoryDimension::AgeRange, query)?,
            date_start: query.range.date_start.clone(),
            date_end: query.range.date_end.clone(),
        })
    }

    /// Whole-corpus statistics.
    ///
    /// Served from the monthly totals index when it has data, otherwise by
    /// scanning every shard.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Store`] if the store cannot be read.
    pub fn stats(&self, kind: StatsKind) -> Result<StatsResponse, QueryError> {
        let by_month = match self.monthly_index() {
            Some(monthly) => {
                log::debug!("Served corpus statistics from the monthly index");
                monthly.0.clone()
            }
            None => {
                let chunks = self.store.chunks(&TimeRange::unbounded())?;
                records_by_month(flatten(&chunks))
            }
        };
        let total = by_month.values().sum();

        Ok(match kind {
            StatsKind::Total => StatsResponse {
                total_records: Some(total),
                records_by_month: None,
            },
            StatsKind::ByMonth => StatsResponse {
                total_records: None,
                records_by_month: Some(by_month),
            },
            StatsKind::All => StatsResponse {
                total_records: Some(total),
                records_by_month: Some(by_month),
            },
        })
    }

    /// Shard listing and total record count.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Store`] if the store cannot be read.
    pub fn inventory(&self) -> Result<InventoryResponse, QueryError> {
        let files = self.store.shard_names()?;
        let chunks = self.store.chunks(&TimeRange::unbounded())?;
        Ok(InventoryResponse {
            data_files: DataFiles {
                count: files.len(),
                files,
            },
            total_records: chunks.iter().map(|chunk| chunk.len() as u64).sum(),
        })
    }

    fn grouped(
        &self,
        dimension: CategoryDimension,
        query: &CategoryQuery,
    ) -> Result<BTreeMap<String, u64>, QueryError> {
        let range = checked_range(&query.range)?;

        if fast_path::is_eligible(&range, &query.filters)
            && let Some(index) = self.indexes.as_ref().and_then(|i| i.category(dimension))
        {
            if let Some(totals) = fast_path::category_totals_from_index(&index, &range) {
                log::debug!("Served {dimension} totals from index");
                return Ok(totals);
            }
            log::warn!("{dimension} index has no data in range; scanning");
        }

        let chunks = self.store.chunks(&range)?;
        let predicate = self.predicate(range, &query.filters);
        Ok(category_totals(flatten(&chunks), &predicate, dimension))
    }

    fn predicate(&self, range: TimeRange, filters: &FilterMap) -> Predicate {
        Predicate::new(range, filters).with_boroughs(self.boroughs.clone())
    }

    fn monthly_index(&self) -> Option<Arc<MonthlyTotals>> {
        let monthly = self.indexes.as_ref()?.monthly_totals()?;
        if monthly.total() == 0 {
            log::warn!("Monthly totals index is empty; scanning");
            return None;
        }
        Some(monthly)
    }

    fn daily_index(
        &self,
        range: &TimeRange,
        filters: &FilterMap,
    ) -> Option<Arc<DailyTotals>> {
        if !fast_path::is_eligible(range, filters) {
            return None;
        }
        self.indexes.as_ref()?.daily_totals()
    }
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, QueryError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(QueryError::MissingParameter { name })
}

fn checked_range(params: &RangeParams) -> Result<TimeRange, QueryError> {
    let range = parse_range(params)?;
    if range.is_inverted() {
        return Err(QueryError::InvalidRange {
            start: params.date_start.clone().unwrap_or_default(),
            end: params.date_end.clone().unwrap_or_default(),
        });
    }
    Ok(range)
}

fn flatten(chunks: &[Arc<[TimedRecord]>]) -> impl Iterator<Item = &TimedRecord> {
    chunks.iter().flat_map(|chunk| chunk.iter())
}
