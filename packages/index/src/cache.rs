//! Lazily loaded, shared views of the on-disk indexes.
//!
//! Each index file is parsed on first use and kept until
//! [`IndexStore::invalidate`]. A missing file is reported as `None` and
//! retried on the next call; a corrupt one is logged and also reported as
//! `None`, which sends the engine down the raw-scan path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use stop_search_aggregate_models::CategoryDimension;

use crate::daily::{DailyCategoryIndex, DailyTotals, IndexKind, MonthlyTotals, read_index};

/// Cached reader for the index files below one aggregation directory.
pub struct IndexStore {
    dir: PathBuf,
    daily: RwLock<Option<Arc<DailyTotals>>>,
    monthly: RwLock<Option<Arc<MonthlyTotals>>>,
    categories: RwLock<BTreeMap<CategoryDimension, Arc<DailyCategoryIndex>>>,
}

impl IndexStore {
    /// Creates a store reading indexes from `aggregation_dir`.
    #[must_use]
    pub fn new(aggregation_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: aggregation_dir.into(),
            daily: RwLock::new(None),
            monthly: RwLock::new(None),
            categories: RwLock::new(BTreeMap::new()),
        }
    }

    /// The daily totals index, if available.
    #[must_use]
    pub fn daily_totals(&self) -> Option<Arc<DailyTotals>> {
        self.cached(&self.daily, IndexKind::DailyTotals)
    }

    /// The monthly totals index, if available.
    #[must_use]
    pub fn monthly_totals(&self) -> Option<Arc<MonthlyTotals>> {
        self.cached(&self.monthly, IndexKind::MonthlyTotals)
    }

    /// The per-day category index for `dimension`, if available.
    #[must_use]
    pub fn category(&self, dimension: CategoryDimension) -> Option<Arc<DailyCategoryIndex>> {
        if let Some(index) = self
            .categories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&dimension)
        {
            return Some(Arc::clone(index));
        }

        let path = IndexKind::for_dimension(dimension).path(&self.dir);
        let loaded = Arc::new(load::<DailyCategoryIndex>(&path)?);
        let mut categories = self
            .categories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Some(Arc::clone(categories.entry(dimension).or_insert(loaded)))
    }

    /// Drops every cached index so the next call re-reads the files.
    pub fn invalidate(&self) {
        *self.daily.write().unwrap_or_else(PoisonError::into_inner) = None;
        *self.monthly.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.categories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        log::info!("Cleared index cache for {}", self.dir.display());
    }

    fn cached<T: DeserializeOwned>(
        &self,
        slot: &RwLock<Option<Arc<T>>>,
        kind: IndexKind,
    ) -> Option<Arc<T>> {
        if let Some(index) = slot.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Some(Arc::clone(index));
        }

        let loaded = Arc::new(load::<T>(&kind.path(&self.dir))?);
        let mut slot = slot.write().unwrap_or_else(PoisonError::into_inner);
        Some(Arc::clone(slot.get_or_insert(loaded)))
    }
}

fn load<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.is_file() {
        log::debug!("Index {} not found", path.display());
        return None;
    }
    match read_index(path) {
        Ok(index) => {
            log::debug!("Loaded index {}", path.display());
            Some(index)
        }
        Err(e) => {
            log::warn!("Ignoring unreadable index {}: {e}", path.display());
            None
        }
    }
}
