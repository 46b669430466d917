//! Conversion between full records and the normalized lookup-table form.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use stop_search_record_models::StopSearchRecord;
use stop_search_record_models::normalized::{
    LookupEntry, NormalizedCorpus, NormalizedSearch, lookup,
};

use crate::StoreError;
use crate::paths::ensure_dir;

/// Builds the normalized corpus.
///
/// Lookup tables cover every distinct non-empty value observed; IDs are
/// assigned 1-based in alphabetical order. Records missing a datetime, age
/// range, officer-defined ethnicity or borough are left out of
/// `search_data`.
#[must_use]
pub fn normalize<'a, I>(records: I) -> NormalizedCorpus
where
    I: IntoIterator<Item = &'a StopSearchRecord>,
    I::IntoIter: Clone,
{
    let records = records.into_iter();

    let mut age_ranges = BTreeSet::new();
    let mut ethnicities = BTreeSet::new();
    let mut boroughs = BTreeSet::new();
    for record in records.clone() {
        if let Some(age) = non_empty(record.age_range.as_deref()) {
            age_ranges.insert(age);
        }
        if let Some(eth) = non_empty(record.officer_defined_ethnicity.as_deref()) {
            ethnicities.insert(eth);
        }
        if let Some(borough) = record.derived_borough() {
            boroughs.insert(borough);
        }
    }

    let (age_table, age_ids) = lookup_table(age_ranges);
    let (eth_table, eth_ids) = lookup_table(ethnicities);
    let (borough_table, borough_ids) = lookup_table(boroughs);

    let mut search_data = Vec::new();
    let mut next_id = 1_u64;
    for record in records {
        if record.datetime.is_empty() {
            continue;
        }
        let Some(a) = non_empty(record.age_range.as_deref()).and_then(|v| age_ids.get(v)) else {
            continue;
        };
        let Some(e) = non_empty(record.officer_defined_ethnicity.as_deref())
            .and_then(|v| eth_ids.get(v))
        else {
            continue;
        };
        let Some(b) = record.derived_borough().and_then(|v| borough_ids.get(v)) else {
            continue;
        };

        search_data.push(NormalizedSearch {
            id: next_id,
            t: record.datetime.clone(),
            a: *a,
            e: *e,
            b: *b,
        });
        next_id += 1;
    }

    log::info!(
        "Normalized {} records ({} age ranges, {} ethnicities, {} boroughs)",
        search_data.len(),
        age_table.len(),
        eth_table.len(),
        borough_table.len()
    );

    NormalizedCorpus {
        age_ranges: age_table,
        ethnicities: eth_table,
        boroughs: borough_table,
        search_data,
    }
}

/// Expands a normalized corpus back into records carrying the datetime,
/// age range, officer-defined ethnicity and borough fields.
///
/// IDs missing from a lookup table resolve to `None`.
#[must_use]
pub fn expand(corpus: &NormalizedCorpus) -> Vec<StopSearchRecord> {
    corpus
        .search_data
        .iter()
        .map(|search| StopSearchRecord {
            datetime: search.t.clone(),
            age_range: resolve(&corpus.age_ranges, search.a, search.id),
            officer_defined_ethnicity: resolve(&corpus.ethnicities, search.e, search.id),
            borough: resolve(&corpus.boroughs, search.b, search.id),
            ..StopSearchRecord::default()
        })
        .collect()
}

/// Writes a normalized corpus as pretty JSON, creating parent directories.
///
/// # Errors
///
/// Returns [`StoreError`] if serialization or the write fails.
pub fn write_normalized(path: &Path, corpus: &NormalizedCorpus) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, serde_json::to_string_pretty(corpus)?)?;
    std::fs::rename(&tmp_path, path)?;
    log::info!("Wrote normalized corpus to {}", path.display());
    Ok(())
}

fn resolve(table: &[LookupEntry], id: u32, record_id: u64) -> Option<String> {
    let name = lookup(table, id);
    if name.is_none() {
        log::warn!("Normalized record {record_id} references unknown lookup id {id}");
    }
    name.map(ToString::to_string)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn lookup_table(names: BTreeSet<&str>) -> (Vec<LookupEntry>, BTreeMap<&str, u32>) {
    let mut table = Vec::with_capacity(names.len());
    let mut ids = BTreeMap::new();
    for (id, name) in (1_u32..).zip(names) {
        table.push(LookupEntry {
            id,
            name: name.to_string(),
        });
        ids.insert(name, id);
    }
    (table, ids)
}
