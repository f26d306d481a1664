use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::index::{BTreeIndex, Postings, SearchMode, TermIndex};
use crate::occurrences::{DocIdSet, Occurrences};

/// A posting list stored as deflate-compressed bincode. Trades CPU on
/// every combine for RAM between combines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedOccurrences(Vec<u8>);

impl CompressedOccurrences {
    pub fn wrap(occurrences: &Occurrences) -> CompressedOccurrences {
        let raw = bincode::serialize(occurrences).expect("posting list encoding");
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).expect("posting list compression");
        CompressedOccurrences(encoder.finish().expect("posting list compression"))
    }

    pub fn unwrap(&self) -> Occurrences {
        let mut decoder = DeflateDecoder::new(self.0.as_slice());
        let mut raw = Vec::new();
        decoder.read_to_end(&mut raw).expect("posting list decompression");
        bincode::deserialize(&raw).expect("posting list decoding")
    }

    pub fn compressed_len(&self) -> usize {
        self.0.len()
    }
}

impl Postings for CompressedOccurrences {
    // Combining must behave exactly as combining the uncompressed values,
    // so both operations go through the codec.
    fn merge(self, other: Self) -> Self {
        CompressedOccurrences::wrap(&self.unwrap().merge(other.unwrap()))
    }

    fn remove_docs(&mut self, docs: &DocIdSet) {
        let mut occurrences = self.unwrap();
        occurrences.remove_docs(docs);
        *self = CompressedOccurrences::wrap(&occurrences);
    }

    fn is_empty(&self) -> bool {
        self.unwrap().is_empty()
    }
}

/// Value-compression proxy: presents plain `Occurrences` while the inner
/// store holds `CompressedOccurrences`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressedIndex {
    inner: BTreeIndex<Vec<u8>, CompressedOccurrences>,
}

impl CompressedIndex {
    pub fn new() -> CompressedIndex {
        CompressedIndex::default()
    }
}

impl TermIndex for CompressedIndex {
    type Key = Vec<u8>;
    type Value = Occurrences;

    fn insert_list(&mut self, entries: Vec<(Vec<u8>, Occurrences)>) {
        let entries = entries
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key, CompressedOccurrences::wrap(&value)))
            .collect();
        self.inner.insert_list(entries);
    }

    fn delete_docs(&mut self, docs: &DocIdSet) {
        self.inner.delete_docs(docs);
    }

    fn search(&self, mode: SearchMode, key: &Vec<u8>) -> Vec<(Vec<u8>, Occurrences)> {
        self.inner
            .search(mode, key)
            .into_iter()
            .map(|(key, value)| (key, value.unwrap()))
            .collect()
    }

    fn lookup_range(&self, lo: &Vec<u8>, hi: &Vec<u8>) -> Vec<(Vec<u8>, Occurrences)> {
        self.inner
            .lookup_range(lo, hi)
            .into_iter()
            .map(|(key, value)| (key, value.unwrap()))
            .collect()
    }

    fn keys(&self) -> Vec<Vec<u8>> {
        self.inner.keys()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn to_list(&self) -> Vec<(Vec<u8>, Occurrences)> {
        self.inner
            .to_list()
            .into_iter()
            .map(|(key, value)| (key, value.unwrap()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occurrences::Positions;

    fn sample() -> Occurrences {
        let mut occurrences = Occurrences::new();
        occurrences.add_positions(1, (0..64).collect::<Positions>());
        occurrences.add_positions(7, [3, 9, 27].into_iter().collect::<Positions>());
        occurrences
    }

    #[test]
    fn codec_round_trips() {
        let occurrences = sample();
        assert_eq!(CompressedOccurrences::wrap(&occurrences).unwrap(), occurrences);

        let empty = Occurrences::new();
        assert_eq!(CompressedOccurrences::wrap(&empty).unwrap(), empty);
    }

    #[test]
    fn combining_commutes_with_the_codec() {
        let a = sample();
        let b = Occurrences::singleton(1, 100);

        let compressed =
            CompressedOccurrences::wrap(&a).merge(CompressedOccurrences::wrap(&b));
        assert_eq!(compressed.unwrap(), a.merge(b));
    }

    #[test]
    fn proxy_observations_match_the_plain_store() {
        let mut compressed = CompressedIndex::new();
        let mut plain: BTreeIndex<Vec<u8>, Occurrences> = BTreeIndex::new();

        let entries = vec![
            (b"hello".to_vec(), sample()),
            (b"help".to_vec(), Occurrences::singleton(2, 1)),
            (b"world".to_vec(), Occurrences::singleton(3, 5)),
        ];
        compressed.insert_list(entries.clone());
        plain.insert_list(entries);

        let key = b"hel".to_vec();
        assert_eq!(
            compressed.search(SearchMode::PrefixCase, &key),
            plain.search(SearchMode::PrefixCase, &key)
        );

        let mut docs = DocIdSet::new();
        docs.insert(1);
        compressed.delete_docs(&docs);
        plain.delete_docs(&docs);
        assert_eq!(compressed.to_list(), plain.to_list());
    }
}
