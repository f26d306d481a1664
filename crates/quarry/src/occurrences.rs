use std::collections::BTreeMap;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::DocId;

/// Ordered, deduplicated set of word positions inside one document.
pub type Positions = RoaringBitmap;

/// Set of document identifiers.
pub type DocIdSet = RoaringBitmap;

/// For one term in one context, the documents it occurs in and the
/// positions at which it occurs. No document maps to an empty position
/// set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Occurrences(BTreeMap<DocId, Positions>);

impl Occurrences {
    pub fn new() -> Occurrences {
        Occurrences::default()
    }

    pub fn singleton(doc: DocId, position: u32) -> Occurrences {
        let mut occurrences = Occurrences::new();
        occurrences.insert(doc, position);
        occurrences
    }

    pub fn insert(&mut self, doc: DocId, position: u32) {
        self.0.entry(doc).or_default().insert(position);
    }

    /// Adds a whole position set for a document, unioning with whatever is
    /// already there. Empty sets are dropped on the floor.
    pub fn add_positions(&mut self, doc: DocId, positions: Positions) {
        if positions.is_empty() {
            return;
        }
        *self.0.entry(doc).or_default() |= positions;
    }

    /// Position-wise union.
    pub fn merge(mut self, other: Occurrences) -> Occurrences {
        for (doc, positions) in other.0 {
            self.add_positions(doc, positions);
        }
        self
    }

    /// Documents present on both sides, with their position intersection.
    /// Documents whose intersection comes out empty are purged.
    pub fn intersect(&self, other: &Occurrences) -> Occurrences {
        let mut result = BTreeMap::new();
        for (doc, positions) in &self.0 {
            if let Some(others) = other.0.get(doc) {
                let common = positions & others;
                if !common.is_empty() {
                    result.insert(*doc, common);
                }
            }
        }
        Occurrences(result)
    }

    /// Position-wise difference, purging documents emptied by it.
    pub fn subtract(&self, other: &Occurrences) -> Occurrences {
        let mut result = BTreeMap::new();
        for (doc, positions) in &self.0 {
            match other.0.get(doc) {
                Some(others) => {
                    let rest = positions - others;
                    if !rest.is_empty() {
                        result.insert(*doc, rest);
                    }
                }
                None => {
                    result.insert(*doc, positions.clone());
                }
            }
        }
        Occurrences(result)
    }

    /// Removes every document of `docs`, whatever its positions.
    pub fn remove_docs(&mut self, docs: &DocIdSet) {
        self.0.retain(|doc, _| !docs.contains(*doc));
    }

    pub fn doc_ids(&self) -> DocIdSet {
        self.0.keys().copied().collect()
    }

    pub fn positions(&self, doc: DocId) -> Option<&Positions> {
        self.0.get(&doc)
    }

    /// Number of documents the term occurs in.
    pub fn doc_count(&self) -> usize {
        self.0.len()
    }

    /// Total number of recorded positions, over all documents.
    pub fn total_positions(&self) -> u64 {
        self.0.values().map(|positions| positions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocId, &Positions)> + '_ {
        self.0.iter().map(|(doc, positions)| (*doc, positions))
    }
}

impl FromIterator<(DocId, Positions)> for Occurrences {
    fn from_iter<I: IntoIterator<Item = (DocId, Positions)>>(iter: I) -> Occurrences {
        let mut occurrences = Occurrences::new();
        for (doc, positions) in iter {
            occurrences.add_positions(doc, positions);
        }
        occurrences
    }
}

impl IntoIterator for Occurrences {
    type Item = (DocId, Positions);
    type IntoIter = std::collections::btree_map::IntoIter<DocId, Positions>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(values: &[u32]) -> Positions {
        values.iter().copied().collect()
    }

    #[test]
    fn merge_unions_positions_per_document() {
        let mut left = Occurrences::new();
        left.add_positions(1, positions(&[0, 3]));
        left.add_positions(2, positions(&[7]));

        let mut right = Occurrences::new();
        right.add_positions(1, positions(&[3, 5]));
        right.add_positions(4, positions(&[1]));

        let merged = left.merge(right);
        assert_eq!(merged.positions(1), Some(&positions(&[0, 3, 5])));
        assert_eq!(merged.positions(2), Some(&positions(&[7])));
        assert_eq!(merged.positions(4), Some(&positions(&[1])));
        assert_eq!(merged.doc_count(), 3);
    }

    #[test]
    fn merge_is_commutative_and_idempotent() {
        let mut a = Occurrences::new();
        a.add_positions(1, positions(&[0, 2]));
        a.add_positions(3, positions(&[9]));

        let mut b = Occurrences::new();
        b.add_positions(1, positions(&[2, 4]));

        assert_eq!(a.clone().merge(b.clone()), b.clone().merge(a.clone()));
        assert_eq!(a.clone().merge(a.clone()), a);
    }

    #[test]
    fn subtract_purges_emptied_documents() {
        let mut left = Occurrences::new();
        left.add_positions(1, positions(&[0, 1]));
        left.add_positions(2, positions(&[5]));

        let mut right = Occurrences::new();
        right.add_positions(2, positions(&[5]));

        let rest = left.subtract(&right);
        assert_eq!(rest.positions(1), Some(&positions(&[0, 1])));
        assert_eq!(rest.positions(2), None);

        assert!(left.subtract(&left).is_empty());
    }

    #[test]
    fn intersect_keeps_common_positions_only() {
        let mut left = Occurrences::new();
        left.add_positions(1, positions(&[0, 1]));
        left.add_positions(2, positions(&[5]));

        let mut right = Occurrences::new();
        right.add_positions(1, positions(&[1, 8]));
        right.add_positions(2, positions(&[6]));

        let common = left.intersect(&right);
        assert_eq!(common.positions(1), Some(&positions(&[1])));
        assert_eq!(common.positions(2), None);
    }

    #[test]
    fn empty_position_sets_are_never_stored() {
        let mut occurrences = Occurrences::new();
        occurrences.add_positions(1, Positions::new());
        assert!(occurrences.is_empty());

        let mut docs = DocIdSet::new();
        docs.insert(1);
        occurrences.add_positions(1, positions(&[0]));
        occurrences.remove_docs(&docs);
        assert!(occurrences.is_empty());
    }
}
