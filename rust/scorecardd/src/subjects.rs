use crate::config::EngineConfig;
use crate::row::{ResultRow, SUBJECT_DETAILS_KEY};
use std::collections::BTreeSet;

/// Splits `Physics__correct` into `Physics`; other keys are their own base name.
pub fn subject_base_name(key: &str) -> &str {
    match key.split_once("__") {
        Some((prefix, _)) => prefix,
        None => key,
    }
}

/// Candidate subject names carried by one row.
pub fn row_subject_candidates(row: &ResultRow, config: &EngineConfig) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for key in row.keys() {
        let base = if key.contains("__") {
            subject_base_name(key)
        } else if config.is_metadata_key(key) {
            continue;
        } else {
            key.as_str()
        };
        let base = base.trim();
        if !base.is_empty() && !config.is_metadata_key(base) {
            out.insert(base.to_string());
        }
    }
    if let Some(details) = row.get(SUBJECT_DETAILS_KEY).and_then(|v| v.as_array()) {
        for entry in details {
            if let Some(name) = crate::row::detail_name(entry) {
                out.insert(name);
            }
        }
    }
    out
}

/// Canonical-order subjects first (only those present), then the rest lexically.
pub fn order_subjects<I>(found: I, canonical: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let found: BTreeSet<String> = found.into_iter().collect();
    let mut out: Vec<String> = canonical
        .iter()
        .filter(|s| found.contains(*s))
        .cloned()
        .collect();
    // BTreeSet iteration is already lexical.
    out.extend(found.into_iter().filter(|s| !canonical.contains(s)));
    out
}

pub fn discover_subjects(rows: &[ResultRow], config: &EngineConfig) -> Vec<String> {
    let found = rows
        .iter()
        .flat_map(|r| row_subject_candidates(r, config))
        .collect::<BTreeSet<_>>();
    if found.is_empty() {
        log::debug!("no subjects discovered across {} rows", rows.len());
    }
    order_subjects(found, &config.subject_order)
}

/// Discovered subjects, or the configured fallback list when nothing was discovered.
pub fn subjects_or_fallback(rows: &[ResultRow], config: &EngineConfig) -> Vec<String> {
    let found = discover_subjects(rows, config);
    if found.is_empty() {
        config.fallback_subjects.clone()
    } else {
        found
    }
}
