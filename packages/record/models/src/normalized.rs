//! Compact lookup-table form of the corpus.
//!
//! Category names are replaced by small integer IDs referencing shared
//! lookup arrays. IDs are dense and 1-based, assigned by sorting the
//! distinct observed names alphabetically.

use serde::{Deserialize, Serialize};

/// One entry of a lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntry {
    /// Dense 1-based ID.
    pub id: u32,
    /// Category name.
    pub name: String,
}

/// A normalized search record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSearch {
    /// Synthetic sequential ID (1-based).
    pub id: u64,
    /// Original timestamp string.
    pub t: String,
    /// Age range ID.
    pub a: u32,
    /// Officer-defined ethnicity ID.
    pub e: u32,
    /// Borough ID.
    pub b: u32,
}

/// The full normalized corpus as written to `data-normalized.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCorpus {
    /// Age range lookup table.
    pub age_ranges: Vec<LookupEntry>,
    /// Ethnicity lookup table.
    pub ethnicities: Vec<LookupEntry>,
    /// Borough lookup table.
    pub boroughs: Vec<LookupEntry>,
    /// Normalized records.
    pub search_data: Vec<NormalizedSearch>,
}

/// Resolves `id` against a lookup table.
///
/// IDs are dense, so this is a direct index with a name check fallback
/// for tables that were edited by hand.
#[must_use]
pub fn lookup(table: &[LookupEntry], id: u32) -> Option<&str> {
    let idx = usize::try_from(id).ok()?.checked_sub(1)?;
    match table.get(idx) {
        Some(entry) if entry.id == id => Some(entry.name.as_str()),
        _ => table
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.name.as_str()),
    }
}
