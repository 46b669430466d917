#![allow(clippy::module_name_repetitions)]
//! Canonical file paths below the data root.
//!
//! The root is resolved from an explicit path, then the
//! [`ROOT_ENV_VAR`] environment variable, then the current directory.

use std::path::{Path, PathBuf};

/// Environment variable naming the data root.
pub const ROOT_ENV_VAR: &str = "STOP_SEARCH_ROOT";

/// Paths to every on-disk artifact the toolchain reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Uses `root` as the data root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves the data root from `explicit`, then [`ROOT_ENV_VAR`], then
    /// the current working directory.
    #[must_use]
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        let root = explicit
            .or_else(|| std::env::var_os(ROOT_ENV_VAR).map(PathBuf::from))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(root)
    }

    /// The data root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of raw monthly shards (`data/`).
    #[must_use]
    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Directory of borough-enriched monthly shards (`data-enriched/`).
    #[must_use]
    pub fn enriched_dir(&self) -> PathBuf {
        self.root.join("data-enriched")
    }

    /// Shard directory to read from: the enriched directory when present,
    /// otherwise the raw one.
    #[must_use]
    pub fn shard_dir(&self) -> PathBuf {
        let enriched = self.enriched_dir();
        if enriched.is_dir() {
            enriched
        } else {
            self.raw_dir()
        }
    }

    /// Directory of precomputed indexes (`data-aggregation/`).
    #[must_use]
    pub fn aggregation_dir(&self) -> PathBuf {
        self.root.join("data-aggregation")
    }

    /// Normalized corpus file.
    #[must_use]
    pub fn normalized_path(&self) -> PathBuf {
        self.root.join("public").join("data-normalized.json")
    }

    /// Borough boundary polygons.
    #[must_use]
    pub fn boundaries_path(&self) -> PathBuf {
        self.root.join("boundaries").join("london_boroughs.geojson")
    }
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_enriched_dir_when_present() {
        let tmp = std::env::temp_dir().join("stop_search_paths_enriched");
        let _ = std::fs::remove_dir_all(&tmp);
        let paths = DataPaths::new(&tmp);
        std::fs::create_dir_all(paths.raw_dir()).unwrap();
        assert_eq!(paths.shard_dir(), paths.raw_dir());

        std::fs::create_dir_all(paths.enriched_dir()).unwrap();
        assert_eq!(paths.shard_dir(), paths.enriched_dir());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn explicit_root_wins() {
        let paths = DataPaths::resolve(Some(PathBuf::from("/srv/stop-search")));
        assert_eq!(paths.root(), Path::new("/srv/stop-search"));
        assert_eq!(
            paths.aggregation_dir(),
            Path::new("/srv/stop-search/data-aggregation")
        );
    }
}
