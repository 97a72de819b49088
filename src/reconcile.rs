//! Schema drift detection between configured form fields and live headers.
//!
//! Every comparison goes through [`normalize`], so cosmetic differences
//! (spacing, case, smart punctuation, full-width forms) never count as drift.
//! They are still surfaced as near-match notes, because an operator usually
//! wants to fix the spelling in one place or the other.

use crate::normalize::normalize;
use crate::schema::FormSchema;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Two actual headers that normalize to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub key: String,
    /// Header that won (first in sheet order)
    pub kept: String,
    /// Header that is shadowed by `kept`
    pub shadowed: String,
}

/// An expected name that only matches an actual header after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NearMatch {
    pub expected: String,
    pub actual: String,
}

/// Normalized key to actual header, with notes about how it was built.
#[derive(Debug, Clone, Default)]
pub struct HeaderMapping {
    pub mapping: HashMap<String, String>,
    pub collisions: Vec<Collision>,
    pub near_matches: Vec<NearMatch>,
    pub notes: Vec<String>,
}

impl HeaderMapping {
    /// Actual header matching `name` under normalization.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.mapping.get(&normalize(name)).map(String::as_str)
    }
}

/// Map each normalized key to the first actual header carrying it.
///
/// Blank header cells are ignored. Collisions and near-matches are recorded
/// both as structured entries and as human-readable notes.
pub fn build_mapping<A, E>(actual_headers: &[A], expected_headers: &[E]) -> HeaderMapping
where
    A: AsRef<str>,
    E: AsRef<str>,
{
    let mut result = HeaderMapping::default();

    for header in actual_headers.iter().map(AsRef::as_ref) {
        let key = normalize(header);
        if key.is_empty() {
            continue;
        }
        match result.mapping.get(&key) {
            Some(kept) => {
                let note = if kept == header {
                    format!("duplicate header '{}'; only the first column is used", header)
                } else {
                    format!(
                        "headers '{}' and '{}' both normalize to '{}'; '{}' is shadowed",
                        kept, header, key, header
                    )
                };
                result.notes.push(note);
                result.collisions.push(Collision {
                    key,
                    kept: kept.clone(),
                    shadowed: header.to_string(),
                });
            }
            None => {
                result.mapping.insert(key, header.to_string());
            }
        }
    }

    for expected in expected_headers.iter().map(AsRef::as_ref) {
        if let Some(actual) = result.mapping.get(&normalize(expected)) {
            if actual != expected {
                result.notes.push(format!(
                    "expected '{}' matches sheet header '{}' only after normalization",
                    expected, actual
                ));
                result.near_matches.push(NearMatch {
                    expected: expected.to_string(),
                    actual: actual.clone(),
                });
            }
        }
    }

    result
}

/// Comparison of a form schema against a worksheet's header row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// Expected names with no matching header, in schema order
    pub missing: Vec<String>,
    /// Sheet headers the schema does not account for, in sheet order
    pub extra: Vec<String>,
    /// Normalized header sequence equals the normalized schema sequence
    pub order_matches: bool,
    pub near_matches: Vec<NearMatch>,
    pub collisions: Vec<Collision>,
    pub notes: Vec<String>,
}

impl ReconciliationReport {
    /// No missing or extra columns and the order matches.
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.order_matches
    }

    /// Same columns as the schema, only in a different order.
    pub fn is_permutation(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && !self.order_matches
    }
}

/// Diff a schema against the actual header row.
///
/// Expected headers are `fields` followed by `signatures`.
pub fn diff<A: AsRef<str>>(schema: &FormSchema, actual_headers: &[A]) -> ReconciliationReport {
    diff_headers(&schema.expected_headers(), actual_headers)
}

/// Diff an explicit expected header list against the actual header row.
pub fn diff_headers<E, A>(expected_headers: &[E], actual_headers: &[A]) -> ReconciliationReport
where
    E: AsRef<str>,
    A: AsRef<str>,
{
    let mapping = build_mapping(actual_headers, expected_headers);

    let expected_keys: Vec<String> = expected_headers
        .iter()
        .map(|e| normalize(e.as_ref()))
        .filter(|k| !k.is_empty())
        .collect();
    let actual_keys: Vec<String> = actual_headers
        .iter()
        .map(|a| normalize(a.as_ref()))
        .filter(|k| !k.is_empty())
        .collect();
    let expected_set: HashSet<&str> = expected_keys.iter().map(String::as_str).collect();

    let missing = expected_headers
        .iter()
        .map(AsRef::as_ref)
        .filter(|e| !mapping.mapping.contains_key(&normalize(e)))
        .map(str::to_string)
        .collect();

    let extra = actual_headers
        .iter()
        .map(AsRef::as_ref)
        .filter(|a| {
            let key = normalize(a);
            !key.is_empty() && !expected_set.contains(key.as_str())
        })
        .map(str::to_string)
        .collect();

    ReconciliationReport {
        missing,
        extra,
        order_matches: expected_keys == actual_keys,
        near_matches: mapping.near_matches,
        collisions: mapping.collisions,
        notes: mapping.notes,
    }
}

/// Lay submitted values out in the sheet's column order.
///
/// Each header takes the value whose key matches it exactly, or failing
/// that, under normalization; headers with no value get `""`. The output
/// always has one cell per header, which keeps a written row aligned with
/// the sheet even when schema and sheet disagree on spelling.
pub fn map_submission<A: AsRef<str>>(
    values: &HashMap<String, String>,
    actual_headers: &[A],
) -> Vec<String> {
    let mut by_key: HashMap<String, (&str, &str)> = HashMap::new();
    for (name, value) in values {
        let key = normalize(name);
        if key.is_empty() {
            continue;
        }
        let entry = by_key.entry(key).or_insert((name.as_str(), value.as_str()));
        // Lowest raw name wins so the choice does not depend on hash order.
        if name.as_str() < entry.0 {
            *entry = (name.as_str(), value.as_str());
        }
    }

    actual_headers
        .iter()
        .map(AsRef::as_ref)
        .map(|header| {
            if let Some(value) = values.get(header) {
                return value.clone();
            }
            let key = normalize(header);
            if key.is_empty() {
                return String::new();
            }
            by_key
                .get(&key)
                .map(|(_, value)| value.to_string())
                .unwrap_or_default()
        })
        .collect()
}
