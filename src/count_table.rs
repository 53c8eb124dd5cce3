//! Frequency tables and the merge engine
//!
//! A `CountTable` maps a matched pattern to the number of times it was seen.
//! Tables are combined by value: `merge` consumes both inputs and returns the
//! per-key sum, so partial results can be folded in any order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountTable {
    counts: HashMap<String, u64>,
}

impl CountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Count for `key`, zero when absent
    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Per-key sum of two tables
    pub fn merge(self, other: CountTable) -> CountTable {
        // Fold the smaller table into the larger one
        let (mut base, overlay) = if self.counts.len() >= other.counts.len() {
            (self, other)
        } else {
            (other, self)
        };
        for (key, count) in overlay.counts {
            *base.counts.entry(key).or_insert(0) += count;
        }
        base
    }

    /// Keys ordered by descending count, ties broken by key, truncated to `limit`
    pub fn ranked(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> = self.iter().collect();
        entries.sort_by(|(ka, ca), (kb, cb)| cb.cmp(ca).then_with(|| ka.cmp(kb)));
        entries.truncate(limit);
        entries
    }
}

/// Fold any number of tables into one; an empty input yields an empty table
pub fn merge_all<I>(tables: I) -> CountTable
where
    I: IntoIterator<Item = CountTable>,
{
    tables.into_iter().fold(CountTable::new(), CountTable::merge)
}

/// Build a table by counting each occurrence once
impl<S: Into<String>> FromIterator<S> for CountTable {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut counts = HashMap::new();
        for key in iter {
            *counts.entry(key.into()).or_insert(0) += 1;
        }
        Self { counts }
    }
}

impl<S: Into<String>> From<Vec<(S, u64)>> for CountTable {
    fn from(pairs: Vec<(S, u64)>) -> Self {
        pairs
            .into_iter()
            .map(|(key, count)| {
                let mut counts = HashMap::with_capacity(1);
                counts.insert(key.into(), count);
                CountTable { counts }
            })
            .fold(CountTable::new(), CountTable::merge)
    }
}
