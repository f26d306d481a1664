use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::index::{IndexKey, Postings, SearchMode, TermIndex};
use crate::occurrences::DocIdSet;

/// The concrete in-memory term store: an ordered map from keys to posting
/// values. Every other index in the crate is a proxy layered over one of
/// these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BTreeIndex<K: Ord, V> {
    entries: BTreeMap<K, V>,
}

impl<K: Ord, V> Default for BTreeIndex<K, V> {
    fn default() -> Self {
        BTreeIndex { entries: BTreeMap::new() }
    }
}

impl<K: IndexKey, V: Postings> BTreeIndex<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_list(entries: Vec<(K, V)>) -> Self {
        let mut index = Self::new();
        index.insert_list(entries);
        index
    }

    /// Merges another index into this one, combining colliding keys with
    /// `op`.
    pub fn union_with(&mut self, other: Self, op: impl Fn(V, V) -> V) {
        for (key, value) in other.entries {
            match self.entries.remove(&key) {
                Some(existing) => {
                    let combined = op(existing, value);
                    if !combined.is_empty() {
                        self.entries.insert(key, combined);
                    }
                }
                None => {
                    if !value.is_empty() {
                        self.entries.insert(key, value);
                    }
                }
            }
        }
    }

    pub fn map_values(&mut self, mut f: impl FnMut(&mut V)) {
        self.entries.retain(|_, value| {
            f(value);
            !value.is_empty()
        });
    }

    /// Keeps only the entries for which `f` answers true; the survivors
    /// may be rewritten in place.
    pub fn retain_values(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        self.entries.retain(|key, value| f(key, value) && !value.is_empty());
    }
}

impl<K: IndexKey, V: Postings> TermIndex for BTreeIndex<K, V> {
    type Key = K;
    type Value = V;

    fn insert_list(&mut self, entries: Vec<(K, V)>) {
        for (key, value) in entries {
            if value.is_empty() {
                continue;
            }
            match self.entries.remove(&key) {
                Some(existing) => {
                    let combined = existing.merge(value);
                    if !combined.is_empty() {
                        self.entries.insert(key, combined);
                    }
                }
                None => {
                    self.entries.insert(key, value);
                }
            }
        }
    }

    fn delete_docs(&mut self, docs: &DocIdSet) {
        self.entries.retain(|_, value| {
            value.remove_docs(docs);
            !value.is_empty()
        });
    }

    fn search(&self, mode: SearchMode, key: &K) -> Vec<(K, V)> {
        match mode {
            SearchMode::Case => self
                .entries
                .get(key)
                .map(|value| vec![(key.clone(), value.clone())])
                .unwrap_or_default(),
            SearchMode::PrefixCase => self
                .entries
                .range(key.clone()..)
                .take_while(|(stored, _)| stored.starts_with(key))
                .map(|(stored, value)| (stored.clone(), value.clone()))
                .collect(),
            // Case-folded comparisons cannot use the key order, they scan.
            SearchMode::NoCase => {
                let folded = key.fold_case();
                self.entries
                    .iter()
                    .filter(|(stored, _)| stored.fold_case() == folded)
                    .map(|(stored, value)| (stored.clone(), value.clone()))
                    .collect()
            }
            SearchMode::PrefixNoCase => {
                let folded = key.fold_case();
                self.entries
                    .iter()
                    .filter(|(stored, _)| stored.fold_case().starts_with(&folded))
                    .map(|(stored, value)| (stored.clone(), value.clone()))
                    .collect()
            }
        }
    }

    fn lookup_range(&self, lo: &K, hi: &K) -> Vec<(K, V)> {
        if lo > hi {
            return Vec::new();
        }
        self.entries
            .range(lo.clone()..=hi.clone())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn keys(&self) -> Vec<K> {
        self.entries.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn to_list(&self) -> Vec<(K, V)> {
        self.entries.iter().map(|(key, value)| (key.clone(), value.clone())).collect()
    }
}
