use std::collections::{BTreeMap, BTreeSet};

use crate::index::RawResult;
use crate::occurrences::{DocIdSet, Positions};
use crate::{Boost, Context, DocId, Score, Word};

/// The search terms that produced a word match, plus a score slot filled
/// in by the ranker after materialization.
#[derive(Debug, Clone, PartialEq)]
pub struct WordInfo {
    pub terms: BTreeSet<Word>,
    pub score: Score,
}

impl WordInfo {
    pub fn new(terms: &[Word]) -> WordInfo {
        WordInfo { terms: terms.iter().cloned().collect(), score: 0.0 }
    }

    /// Terms union, scores sum.
    pub fn combine(mut self, other: WordInfo) -> WordInfo {
        self.terms.extend(other.terms);
        self.score += other.score;
        self
    }
}

pub type WordMatches = BTreeMap<Word, (WordInfo, Positions)>;
pub type ContextMatches = BTreeMap<Context, WordMatches>;

/// Everything known about one document while a query is being combined:
/// which words matched in which contexts, and the document's boost.
#[derive(Debug, Clone, PartialEq)]
pub struct DocMatch {
    pub contexts: ContextMatches,
    pub boost: Boost,
}

impl DocMatch {
    /// Recursive combine: outer contexts union, inner words union; for a
    /// colliding word the infos combine and the positions union. The
    /// boost is left to `boost_op`.
    fn combine(mut self, other: DocMatch, boost_op: impl Fn(Boost, Boost) -> Boost) -> DocMatch {
        for (context, words) in other.contexts {
            let target = self.contexts.entry(context).or_default();
            for (word, (info, positions)) in words {
                match target.remove(&word) {
                    Some((known, known_positions)) => {
                        target.insert(word, (known.combine(info), known_positions | positions));
                    }
                    None => {
                        target.insert(word, (info, positions));
                    }
                }
            }
        }
        self.boost = boost_op(self.boost, other.boost);
        self
    }
}

/// The per-query combinator domain: partial results per document, before
/// materialization. Transient, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Intermediate {
    docs: BTreeMap<DocId, DocMatch>,
}

impl Intermediate {
    pub fn new() -> Intermediate {
        Intermediate::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn doc_ids(&self) -> DocIdSet {
        self.docs.keys().copied().collect()
    }

    pub fn get(&self, doc: DocId) -> Option<&DocMatch> {
        self.docs.get(&doc)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocId, &DocMatch)> + '_ {
        self.docs.iter().map(|(doc, doc_match)| (*doc, doc_match))
    }

    fn combine_with(
        mut self,
        other: Intermediate,
        boost_op: impl Fn(Boost, Boost) -> Boost,
    ) -> Intermediate {
        for (doc, doc_match) in other.docs {
            match self.docs.remove(&doc) {
                Some(known) => {
                    self.docs.insert(doc, known.combine(doc_match, &boost_op));
                }
                None => {
                    self.docs.insert(doc, doc_match);
                }
            }
        }
        self
    }

    /// Per-document combine over the union of both key sets; boosts
    /// multiply.
    pub fn union(self, other: Intermediate) -> Intermediate {
        self.combine_with(other, |left, right| left * right)
    }

    /// Like `union`, but the right-hand boost is treated as the identity.
    /// This is the combine for per-context results of a single query
    /// term; it must not re-apply the user's boost.
    pub fn merge(self, other: Intermediate) -> Intermediate {
        self.combine_with(other, |left, _| left)
    }

    /// The `union` combine, applied only where both sides contain the
    /// document.
    pub fn intersection(self, other: Intermediate) -> Intermediate {
        let mut other = other.docs;
        let mut docs = BTreeMap::new();
        for (doc, left) in self.docs {
            if let Some(right) = other.remove(&doc) {
                docs.insert(doc, left.combine(right, |a, b| a * b));
            }
        }
        Intermediate { docs }
    }

    /// Keys of the left side minus keys of the right; left values
    /// unchanged.
    pub fn difference(mut self, other: &Intermediate) -> Intermediate {
        self.docs.retain(|doc, _| !other.docs.contains_key(doc));
        self
    }

    pub fn unions(list: Vec<Intermediate>) -> Intermediate {
        list.into_iter().fold(Intermediate::new(), Intermediate::union)
    }

    pub fn merges(list: Vec<Intermediate>) -> Intermediate {
        list.into_iter().fold(Intermediate::new(), Intermediate::merge)
    }

    /// Running fold that stops at the first prefix holding at least
    /// `limit` documents. The list is assumed ordered so that earlier
    /// elements are better. Zero disables the limit.
    pub fn unions_doc_limited(limit: usize, list: Vec<Intermediate>) -> Intermediate {
        Self::fold_doc_limited(limit, list, Intermediate::union)
    }

    pub fn merges_doc_limited(limit: usize, list: Vec<Intermediate>) -> Intermediate {
        Self::fold_doc_limited(limit, list, Intermediate::merge)
    }

    fn fold_doc_limited(
        limit: usize,
        list: Vec<Intermediate>,
        combine: impl Fn(Intermediate, Intermediate) -> Intermediate,
    ) -> Intermediate {
        let mut folded = Intermediate::new();
        for next in list {
            folded = combine(folded, next);
            if limit != 0 && folded.len() >= limit {
                break;
            }
        }
        folded
    }

    /// Builds the intermediate for a single term in a single context from
    /// a raw posting result. Every document gets a single-word entry and
    /// the context's weight as boost.
    ///
    /// When one document appears under several words of the raw result,
    /// the first word wins. Callers must pass results in best-first
    /// order, or avoid passing several matches for one document.
    pub fn from_list(
        terms: &[Word],
        context: &str,
        boost: Boost,
        raw: RawResult,
    ) -> Intermediate {
        let mut docs = BTreeMap::new();
        for (word, occurrences) in raw {
            for (doc, positions) in occurrences {
                if docs.contains_key(&doc) {
                    continue;
                }
                let mut words = WordMatches::new();
                words.insert(word.clone(), (WordInfo::new(terms), positions));
                let mut contexts = ContextMatches::new();
                contexts.insert(context.to_string(), words);
                docs.insert(doc, DocMatch { contexts, boost });
            }
        }
        Intermediate { docs }
    }

    /// `merges` over `from_list` applied to each per-context raw result.
    pub fn from_list_cxs(
        terms: &[Word],
        results: Vec<(Context, Boost, RawResult)>,
    ) -> Intermediate {
        let list = results
            .into_iter()
            .map(|(context, boost, raw)| Intermediate::from_list(terms, &context, boost, raw))
            .collect();
        Intermediate::merges(list)
    }

    /// Multiplies the boost of every document, for query-level boosting.
    pub fn scale_boost(&mut self, boost: Boost) {
        for doc_match in self.docs.values_mut() {
            doc_match.boost *= boost;
        }
    }
}

impl IntoIterator for Intermediate {
    type Item = (DocId, DocMatch);
    type IntoIter = std::collections::btree_map::IntoIter<DocId, DocMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.into_iter()
    }
}
