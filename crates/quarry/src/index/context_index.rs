use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::index::{AnyIndex, RawResult, SearchMode};
use crate::occurrences::{DocIdSet, Occurrences};
use crate::{Context, InternalError, Result, UserError, Word};

/// Fans every operation out over a map of per-context inner indexes.
///
/// The set of contexts here must exactly equal the schema's key set; both
/// sides are mutated in the same indexer transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextIndex {
    contexts: BTreeMap<Context, AnyIndex>,
}

impl ContextIndex {
    pub fn new() -> ContextIndex {
        ContextIndex::default()
    }

    /// Registers a fresh, empty sub-index under `context`.
    pub fn insert_context(&mut self, context: &str, index: AnyIndex) -> Result<()> {
        if self.contexts.contains_key(context) {
            return Err(UserError::ContextExists(context.to_string()).into());
        }
        self.contexts.insert(context.to_string(), index);
        Ok(())
    }

    /// Removes a context and every posting under it. Idempotent.
    pub fn delete_context(&mut self, context: &str) {
        self.contexts.remove(context);
    }

    pub fn has_context(&self, context: &str) -> bool {
        self.contexts.contains_key(context)
    }

    pub fn contexts(&self) -> Vec<&str> {
        self.contexts.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn get(&self, context: &str) -> Option<&AnyIndex> {
        self.contexts.get(context)
    }

    fn sub_index(&self, context: &str) -> Result<&AnyIndex> {
        self.contexts
            .get(context)
            .ok_or_else(|| InternalError::ContextOutOfSync(context.to_string()).into())
    }

    pub fn insert_list(
        &mut self,
        context: &str,
        entries: Vec<(Word, Occurrences)>,
    ) -> Result<()> {
        match self.contexts.get_mut(context) {
            Some(index) => {
                index.insert_list(entries);
                Ok(())
            }
            None => Err(InternalError::ContextOutOfSync(context.to_string()).into()),
        }
    }

    pub fn search_with_cx(
        &self,
        mode: SearchMode,
        context: &str,
        term: &str,
    ) -> Result<RawResult> {
        Ok(self.sub_index(context)?.search(mode, term))
    }

    /// Searches a set of contexts, each with its own already-normalized
    /// term.
    pub fn search_with_cxs_normalized(
        &self,
        mode: SearchMode,
        terms: &[(Context, Word)],
    ) -> Result<Vec<(Context, RawResult)>> {
        terms
            .iter()
            .map(|(context, term)| {
                let raw = self.sub_index(context)?.search(mode, term);
                Ok((context.clone(), raw))
            })
            .collect()
    }

    pub fn lookup_range_cx(&self, context: &str, lo: &str, hi: &str) -> Result<RawResult> {
        Ok(self.sub_index(context)?.lookup_range(lo, hi))
    }

    /// Removes the documents from every context.
    pub fn delete_docs(&mut self, docs: &DocIdSet) {
        for index in self.contexts.values_mut() {
            index.delete_docs(docs);
        }
    }

    pub fn term_count(&self, context: &str) -> usize {
        self.contexts.get(context).map(AnyIndex::term_count).unwrap_or(0)
    }
}
