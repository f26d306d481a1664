use serde::{Deserialize, Serialize};

use crate::occurrences::{DocIdSet, Occurrences};
use crate::Word;

pub mod any_index;
pub mod btree_index;
pub mod compression;
pub mod context_index;
pub mod key_proxy;

pub use self::any_index::AnyIndex;
pub use self::btree_index::BTreeIndex;
pub use self::compression::{CompressedIndex, CompressedOccurrences};
pub use self::key_proxy::{KeyCodec, KeyedIndex};

/// How a term is matched against the stored keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    Case,
    NoCase,
    PrefixCase,
    PrefixNoCase,
}

impl SearchMode {
    pub fn is_prefix(self) -> bool {
        matches!(self, SearchMode::PrefixCase | SearchMode::PrefixNoCase)
    }

    pub fn is_case_sensitive(self) -> bool {
        matches!(self, SearchMode::Case | SearchMode::PrefixCase)
    }
}

/// What a term-index search hands back: matching words with their full
/// posting lists, in index order. The order is meaningful for limiting.
pub type RawResult = Vec<(Word, Occurrences)>;

/// The per-term value constraint of a term index: values must know how to
/// combine, how to forget documents, and when they are empty.
pub trait Postings: Clone {
    fn merge(self, other: Self) -> Self;
    fn remove_docs(&mut self, docs: &DocIdSet);
    fn is_empty(&self) -> bool;
}

impl Postings for Occurrences {
    fn merge(self, other: Self) -> Self {
        Occurrences::merge(self, other)
    }

    fn remove_docs(&mut self, docs: &DocIdSet) {
        Occurrences::remove_docs(self, docs);
    }

    fn is_empty(&self) -> bool {
        Occurrences::is_empty(self)
    }
}

/// Key behavior the ordered store needs beyond `Ord`: prefix tests and
/// case folding. Keys without a meaningful case or prefix fall back to
/// identity and equality.
pub trait IndexKey: Clone + Ord {
    fn fold_case(&self) -> Self;
    fn starts_with(&self, prefix: &Self) -> bool;
}

impl IndexKey for String {
    fn fold_case(&self) -> String {
        self.to_lowercase()
    }

    fn starts_with(&self, prefix: &String) -> bool {
        self.as_str().starts_with(prefix.as_str())
    }
}

impl IndexKey for Vec<u8> {
    // Byte keys are folded as UTF-8 text so that folding commutes with
    // the text key codec.
    fn fold_case(&self) -> Vec<u8> {
        String::from_utf8_lossy(self).to_lowercase().into_bytes()
    }

    fn starts_with(&self, prefix: &Vec<u8>) -> bool {
        self.as_slice().starts_with(prefix)
    }
}

impl IndexKey for i64 {
    fn fold_case(&self) -> i64 {
        *self
    }

    fn starts_with(&self, prefix: &i64) -> bool {
        self == prefix
    }
}

/// A term index: an ordered store over terms mapping to per-term posting
/// values, with case/prefix search and inclusive range lookup.
///
/// Empty values are never stored, search results are deduplicated by key.
pub trait TermIndex {
    type Key: IndexKey;
    type Value: Postings;

    /// Inserts every entry, combining with an existing value through the
    /// value's merge operation.
    fn insert_list(&mut self, entries: Vec<(Self::Key, Self::Value)>);

    /// Removes the given documents from every posting list. Lists emptied
    /// by the removal are purged.
    fn delete_docs(&mut self, docs: &DocIdSet);

    fn search(&self, mode: SearchMode, key: &Self::Key) -> Vec<(Self::Key, Self::Value)>;

    /// Inclusive lexicographic range. An inverted range is empty.
    fn lookup_range(&self, lo: &Self::Key, hi: &Self::Key)
        -> Vec<(Self::Key, Self::Value)>;

    fn keys(&self) -> Vec<Self::Key>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_list(&self) -> Vec<(Self::Key, Self::Value)>;
}
