use serde::{Deserialize, Serialize};

use crate::index::btree_index::BTreeIndex;
use crate::index::compression::CompressedIndex;
use crate::index::key_proxy::{
    DateCodec, IntCodec, KeyCodec, KeyedIndex, PositionCodec, TextCodec,
};
use crate::index::{RawResult, SearchMode, TermIndex};
use crate::occurrences::{DocIdSet, Occurrences};

pub type TextIndex = KeyedIndex<TextCodec, CompressedIndex>;
pub type IntIndex = KeyedIndex<IntCodec, BTreeIndex<i64, Occurrences>>;
pub type DateIndex = KeyedIndex<DateCodec, BTreeIndex<Vec<u8>, Occurrences>>;
pub type GeoIndex = KeyedIndex<PositionCodec, BTreeIndex<Vec<u8>, Occurrences>>;

/// The concrete index held by one context. Different contexts hold
/// different variants; the schema's kind decides which one is minted.
///
/// Text postings are compressed, the typed variants are not: their
/// posting lists are short and their keys carry the structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnyIndex {
    Text(TextIndex),
    Int(IntIndex),
    Date(DateIndex),
    Position(GeoIndex),
}

impl AnyIndex {
    pub fn empty_text() -> AnyIndex {
        AnyIndex::Text(TextIndex::default())
    }

    pub fn empty_int() -> AnyIndex {
        AnyIndex::Int(IntIndex::default())
    }

    pub fn empty_date() -> AnyIndex {
        AnyIndex::Date(DateIndex::default())
    }

    pub fn empty_position() -> AnyIndex {
        AnyIndex::Position(GeoIndex::default())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            AnyIndex::Text(_) => TextCodec::NAME,
            AnyIndex::Int(_) => IntCodec::NAME,
            AnyIndex::Date(_) => DateCodec::NAME,
            AnyIndex::Position(_) => PositionCodec::NAME,
        }
    }

    fn inner(&self) -> &dyn TermIndex<Key = String, Value = Occurrences> {
        match self {
            AnyIndex::Text(index) => index,
            AnyIndex::Int(index) => index,
            AnyIndex::Date(index) => index,
            AnyIndex::Position(index) => index,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn TermIndex<Key = String, Value = Occurrences> {
        match self {
            AnyIndex::Text(index) => index,
            AnyIndex::Int(index) => index,
            AnyIndex::Date(index) => index,
            AnyIndex::Position(index) => index,
        }
    }

    pub fn insert_list(&mut self, entries: Vec<(String, Occurrences)>) {
        self.inner_mut().insert_list(entries);
    }

    pub fn delete_docs(&mut self, docs: &DocIdSet) {
        self.inner_mut().delete_docs(docs);
    }

    pub fn search(&self, mode: SearchMode, term: &str) -> RawResult {
        self.inner().search(mode, &term.to_string())
    }

    pub fn lookup_range(&self, lo: &str, hi: &str) -> RawResult {
        self.inner().lookup_range(&lo.to_string(), &hi.to_string())
    }

    pub fn term_count(&self) -> usize {
        self.inner().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner().is_empty()
    }

    pub fn terms(&self) -> Vec<String> {
        self.inner().keys()
    }
}
