//! Membership diff between two comma-joined identifier lists

use serde::Serialize;

/// Identifiers gained and lost by a link cell write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl LinkDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Rows on the other table whose caches must be recomputed: added then
    /// removed, first occurrence only.
    pub fn touched(&self) -> Vec<String> {
        let mut touched: Vec<String> = Vec::with_capacity(self.added.len() + self.removed.len());
        for id in self.added.iter().chain(&self.removed) {
            if !touched.contains(id) {
                touched.push(id.clone());
            }
        }
        touched
    }
}

/// Split a stored cell value into identifiers. Absent and empty are both empty.
pub fn split_ids(value: Option<&str>) -> Vec<&str> {
    match value {
        Some(value) if !value.is_empty() => value.split(',').collect(),
        _ => Vec::new(),
    }
}

/// Compare a new cell value against the old one.
///
/// `added` keeps the order of `new_value`, `removed` the order of
/// `old_value`. Duplicates inside one list are carried through as-is.
pub fn compute_diff(new_value: Option<&str>, old_value: Option<&str>) -> LinkDiff {
    let new_ids = split_ids(new_value);
    let old_ids = split_ids(old_value);

    let added = new_ids
        .iter()
        .filter(|id| !old_ids.contains(*id))
        .map(|id| id.to_string())
        .collect();
    let removed = old_ids
        .iter()
        .filter(|id| !new_ids.contains(*id))
        .map(|id| id.to_string())
        .collect();

    LinkDiff { added, removed }
}
