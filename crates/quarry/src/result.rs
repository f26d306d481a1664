use std::collections::BTreeMap;

use serde::Serialize;

use crate::doc_table::DocTable;
use crate::document::Document;
use crate::intermediate::{Intermediate, WordInfo};
use crate::occurrences::Positions;
use crate::{Boost, Context, DocId, Score, Word};

/// A found document with its boost and its late-assigned score.
#[derive(Debug, Clone, PartialEq)]
pub struct DocInfo {
    pub document: Document,
    pub boost: Boost,
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocHit {
    pub info: DocInfo,
    pub contexts: BTreeMap<Context, BTreeMap<Word, Positions>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordHit {
    pub info: WordInfo,
    pub contexts: BTreeMap<Context, BTreeMap<DocId, Positions>>,
}

/// The materialized form of a final intermediate: per-document hits
/// joined against the document table, and the inverted per-word view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    pub doc_hits: BTreeMap<DocId, DocHit>,
    pub word_hits: BTreeMap<Word, WordHit>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.doc_hits.is_empty()
    }

    pub fn doc_count(&self) -> usize {
        self.doc_hits.len()
    }
}

/// Joins a final intermediate with the document table. Scores start at
/// zero here; ranking assigns them afterwards.
pub fn materialize(intermediate: Intermediate, table: &DocTable) -> SearchResult {
    let mut doc_hits = BTreeMap::new();
    let mut word_hits: BTreeMap<Word, WordHit> = BTreeMap::new();

    for (doc, doc_match) in intermediate {
        let document = table.lookup(doc).unwrap_or_default();
        let mut contexts: BTreeMap<Context, BTreeMap<Word, Positions>> = BTreeMap::new();

        for (context, words) in doc_match.contexts {
            for (word, (info, positions)) in words {
                contexts
                    .entry(context.clone())
                    .or_default()
                    .insert(word.clone(), positions.clone());

                // entries born from an empty search term carry no signal
                if info.terms.len() == 1 && info.terms.contains("") {
                    continue;
                }
                match word_hits.remove(&word) {
                    Some(mut hit) => {
                        hit.info = hit.info.combine(info);
                        let by_doc = hit.contexts.entry(context.clone()).or_default();
                        match by_doc.remove(&doc) {
                            Some(known) => {
                                by_doc.insert(doc, known | positions);
                            }
                            None => {
                                by_doc.insert(doc, positions);
                            }
                        }
                        word_hits.insert(word, hit);
                    }
                    None => {
                        let mut by_doc = BTreeMap::new();
                        by_doc.insert(doc, positions);
                        let mut hit_contexts = BTreeMap::new();
                        hit_contexts.insert(context.clone(), by_doc);
                        word_hits.insert(word, WordHit { info, contexts: hit_contexts });
                    }
                }
            }
        }

        let info = DocInfo { document, boost: doc_match.boost, score: 0.0 };
        doc_hits.insert(doc, DocHit { info, contexts });
    }

    SearchResult { doc_hits, word_hits }
}

/// The occurrence-count ranking heuristic: a document scores its boost
/// times the number of matched positions, a word scores its document
/// frequency. Deliberately simple, not a relevance model.
pub fn rank(result: &mut SearchResult) {
    for hit in result.doc_hits.values_mut() {
        let matched: u64 = hit
            .contexts
            .values()
            .flat_map(|words| words.values())
            .map(Positions::len)
            .sum();
        hit.info.score = hit.info.boost * matched as Score;
    }

    for hit in result.word_hits.values_mut() {
        let documents: u64 = hit.contexts.values().map(|by_doc| by_doc.len() as u64).sum();
        hit.info.score = documents as Score;
    }
}

/// One page of ranked hits, with enough envelope to page further.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitedResult<T> {
    pub items: Vec<T>,
    pub offset: usize,
    pub max: usize,
    /// Total number of hits before paging.
    pub count: usize,
}

impl<T> LimitedResult<T> {
    /// Pages an already-ordered hit list. A `max` of zero means no page
    /// limit.
    pub fn page(items: Vec<T>, offset: usize, max: usize) -> LimitedResult<T> {
        let count = items.len();
        let items: Vec<T> = if max == 0 {
            items.into_iter().skip(offset).collect()
        } else {
            items.into_iter().skip(offset).take(max).collect()
        };
        LimitedResult { items, offset, max, count }
    }
}

#[cfg(test)]
mod tests {
    use big_s::S;

    use super::*;
    use crate::occurrences::Occurrences;

    fn intermediate_for(entries: &[(DocId, &str, &str, Boost)]) -> Intermediate {
        let list = entries
            .iter()
            .map(|(doc, context, word, boost)| {
                let raw = vec![(word.to_string(), Occurrences::singleton(*doc, 0))];
                Intermediate::from_list(&[word.to_string()], context, *boost, raw)
            })
            .collect();
        Intermediate::unions(list)
    }

    #[test]
    fn missing_documents_fall_back_to_empty() {
        let table = DocTable::new();
        let result = materialize(intermediate_for(&[(7, "content", "ghost", 1.0)]), &table);

        let hit = &result.doc_hits[&7];
        assert_eq!(hit.info.document, Document::default());
        assert_eq!(hit.info.score, 0.0);
        assert!(hit.contexts["content"].contains_key("ghost"));
    }

    #[test]
    fn word_hits_invert_the_intermediate() {
        let intermediate = intermediate_for(&[
            (1, "content", "hello", 1.0),
            (2, "content", "hello", 1.0),
            (2, "subject", "world", 1.0),
        ]);
        let result = materialize(intermediate, &DocTable::new());

        let hello = &result.word_hits[&S("hello")];
        assert_eq!(hello.contexts["content"].len(), 2);
        assert!(result.word_hits.contains_key("world"));
    }

    #[test]
    fn empty_search_terms_are_excluded_from_word_hits() {
        let raw = vec![(S("anything"), Occurrences::singleton(1, 0))];
        let intermediate = Intermediate::from_list(&[S("")], "content", 1.0, raw);
        let result = materialize(intermediate, &DocTable::new());

        assert_eq!(result.doc_count(), 1);
        assert!(result.word_hits.is_empty());
    }

    #[test]
    fn ranking_multiplies_boost_and_occurrences() {
        let mut result =
            materialize(intermediate_for(&[(1, "content", "hello", 2.0)]), &DocTable::new());
        rank(&mut result);

        assert_eq!(result.doc_hits[&1].info.score, 2.0);
        assert_eq!(result.word_hits[&S("hello")].info.score, 1.0);
    }

    #[test]
    fn paging_clamps_to_the_hit_list() {
        let page = LimitedResult::page(vec![1, 2, 3, 4], 1, 2);
        assert_eq!(page.items, vec![2, 3]);
        assert_eq!(page.count, 4);

        let rest = LimitedResult::page(vec![1, 2, 3, 4], 3, 10);
        assert_eq!(rest.items, vec![4]);

        let all = LimitedResult::page(vec![1, 2, 3], 0, 0);
        assert_eq!(all.items, vec![1, 2, 3]);
    }
}
