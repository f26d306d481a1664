use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::doc_table::DocTable;
use crate::document::Document;
use crate::index::context_index::ContextIndex;
use crate::occurrences::{DocIdSet, Occurrences, Positions};
use crate::schema::{ContextSchema, KindRegistry, Schema};
use crate::{Context, DocId, Result, UserError, Word};

/// The engine's single owned value: context index, document table and
/// schema. Every mutation leaves it consistent; the engine publishes a
/// whole new indexer per command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Indexer {
    pub index: ContextIndex,
    pub docs: DocTable,
    pub schema: Schema,
}

impl Indexer {
    pub fn new() -> Indexer {
        Indexer::default()
    }

    /// Creates a context in the schema and the index in one transition.
    pub fn insert_context(&mut self, context: &str, schema: ContextSchema) -> Result<()> {
        if self.schema.contains(context) {
            return Err(UserError::ContextExists(context.to_string()).into());
        }
        let kind = KindRegistry::standard()
            .get(&schema.kind)
            .ok_or_else(|| UserError::UnknownContextKind(schema.kind.clone()))?;

        self.index.insert_context(context, kind.new_index())?;
        self.schema.insert(context, schema);
        debug!(context, "created context");
        Ok(())
    }

    /// Drops a context's schema entry and its whole index subtree.
    /// Idempotent.
    pub fn delete_context(&mut self, context: &str) {
        self.index.delete_context(context);
        if self.schema.remove(context).is_some() {
            debug!(context, "deleted context");
        }
    }

    /// Ingests a new document. The URI must be fresh and every mentioned
    /// context must exist.
    pub fn insert_document(&mut self, document: &Document) -> Result<DocId> {
        if self.docs.contains_uri(&document.uri) {
            return Err(UserError::DocumentExists(document.uri.clone()).into());
        }
        let analyzed = self.analyze(document)?;
        let id = self.docs.insert(document);
        self.apply_postings(id, analyzed)?;
        debug!(uri = %document.uri, id, "inserted document");
        Ok(id)
    }

    /// Replaces an existing document: postings out, new postings in, same
    /// identifier.
    pub fn update_document(&mut self, document: &Document) -> Result<DocId> {
        let id = self
            .docs
            .doc_id_of(&document.uri)
            .ok_or_else(|| UserError::DocumentMissing(document.uri.clone()))?;
        let analyzed = self.analyze(document)?;

        let mut stale = DocIdSet::new();
        stale.insert(id);
        self.index.delete_docs(&stale);

        self.docs.update(id, document);
        self.apply_postings(id, analyzed)?;
        debug!(uri = %document.uri, id, "updated document");
        Ok(id)
    }

    /// Deletes every document of the URI set; unknown URIs are silently
    /// ignored.
    pub fn batch_delete(&mut self, uris: &BTreeSet<String>) -> DocIdSet {
        let mut ids = DocIdSet::new();
        for uri in uris {
            if let Some(id) = self.docs.doc_id_of(uri) {
                ids.insert(id);
            }
        }
        self.index.delete_docs(&ids);
        self.docs.difference(&ids);
        debug!(deleted = ids.len(), requested = uris.len(), "batch delete");
        ids
    }

    /// Tokenizes and normalizes every indexed field of a document before
    /// anything is mutated.
    fn analyze(
        &self,
        document: &Document,
    ) -> Result<BTreeMap<Context, BTreeMap<Word, Positions>>> {
        let registry = KindRegistry::standard();
        let mut analyzed = BTreeMap::new();

        for (context, content) in &document.index {
            let schema = self
                .schema
                .get(context)
                .ok_or_else(|| UserError::UnresolvedDocumentContext(context.clone()))?;
            let kind = registry
                .get(&schema.kind)
                .ok_or_else(|| UserError::UnknownContextKind(schema.kind.clone()))?;

            let mut terms: BTreeMap<Word, Positions> = BTreeMap::new();
            for (position, token) in kind.tokenize(content) {
                let word = kind.normalize_value(&token).ok_or_else(|| {
                    UserError::InvalidValue { context: context.clone(), value: token.clone() }
                })?;
                terms.entry(word).or_default().insert(position);
            }
            analyzed.insert(context.clone(), terms);
        }
        Ok(analyzed)
    }

    fn apply_postings(
        &mut self,
        id: DocId,
        analyzed: BTreeMap<Context, BTreeMap<Word, Positions>>,
    ) -> Result<()> {
        for (context, terms) in analyzed {
            let entries = terms
                .into_iter()
                .map(|(word, positions)| {
                    let mut occurrences = Occurrences::new();
                    occurrences.add_positions(id, positions);
                    (word, occurrences)
                })
                .collect();
            self.index.insert_list(&context, entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SearchMode;
    use crate::schema::ContextSchema;

    fn indexer_with_content() -> Indexer {
        let mut indexer = Indexer::new();
        indexer.insert_context("content", ContextSchema::text()).unwrap();
        indexer
    }

    #[test]
    fn insert_builds_postings_with_positions() {
        let mut indexer = indexer_with_content();
        let id = indexer
            .insert_document(&Document::new("id://1").indexed("content", "hello world"))
            .unwrap();

        let raw = indexer.index.search_with_cx(SearchMode::Case, "content", "world").unwrap();
        assert_eq!(raw.len(), 1);
        let positions = raw[0].1.positions(id).unwrap();
        assert_eq!(positions.iter().collect::<Vec<u32>>(), vec![1]);
    }

    #[test]
    fn duplicate_insert_is_a_conflict_and_mutates_nothing() {
        let mut indexer = indexer_with_content();
        indexer
            .insert_document(&Document::new("id://1").indexed("content", "hello"))
            .unwrap();

        let error = indexer
            .insert_document(&Document::new("id://1").indexed("content", "changed"))
            .unwrap_err();
        assert_eq!(error.code(), 409);
        assert!(indexer
            .index
            .search_with_cx(SearchMode::Case, "content", "changed")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn insert_into_an_unknown_context_is_a_conflict() {
        let mut indexer = indexer_with_content();
        let error = indexer
            .insert_document(&Document::new("id://1").indexed("subject", "hello"))
            .unwrap_err();
        assert_eq!(error.code(), 409);
        assert!(indexer.docs.is_empty());
    }

    #[test]
    fn update_replaces_postings_and_keeps_the_id() {
        let mut indexer = indexer_with_content();
        let id = indexer
            .insert_document(&Document::new("id://1").indexed("content", "old words"))
            .unwrap();

        let updated = indexer
            .update_document(&Document::new("id://1").indexed("content", "new words"))
            .unwrap();
        assert_eq!(id, updated);

        assert!(indexer
            .index
            .search_with_cx(SearchMode::Case, "content", "old")
            .unwrap()
            .is_empty());
        let raw = indexer.index.search_with_cx(SearchMode::Case, "content", "new").unwrap();
        assert_eq!(raw.len(), 1);
    }

    #[test]
    fn update_of_a_missing_document_is_a_conflict() {
        let mut indexer = indexer_with_content();
        let error = indexer
            .update_document(&Document::new("id://nope").indexed("content", "hello"))
            .unwrap_err();
        assert_eq!(error.code(), 409);
    }

    #[test]
    fn batch_delete_ignores_missing_uris() {
        let mut indexer = indexer_with_content();
        indexer
            .insert_document(&Document::new("id://1").indexed("content", "hello"))
            .unwrap();
        indexer
            .insert_document(&Document::new("id://2").indexed("content", "hello"))
            .unwrap();

        let uris: BTreeSet<String> =
            ["id://1", "id://missing"].into_iter().map(String::from).collect();
        let deleted = indexer.batch_delete(&uris);

        assert_eq!(deleted.len(), 1);
        assert_eq!(indexer.docs.len(), 1);
        let raw = indexer.index.search_with_cx(SearchMode::Case, "content", "hello").unwrap();
        assert_eq!(raw[0].1.doc_count(), 1);
    }

    #[test]
    fn typed_context_rejects_bad_values() {
        let mut indexer = indexer_with_content();
        indexer.insert_context("published", ContextSchema::of_kind("date")).unwrap();

        let error = indexer
            .insert_document(&Document::new("id://1").indexed("published", "not a date"))
            .unwrap_err();
        assert_eq!(error.code(), 400);

        indexer
            .insert_document(&Document::new("id://2").indexed("published", "2014-1-15"))
            .unwrap();
        let raw = indexer
            .index
            .search_with_cx(SearchMode::Case, "published", "2014-01-15")
            .unwrap();
        assert_eq!(raw.len(), 1);
    }

    #[test]
    fn unknown_kind_in_context_creation_is_410() {
        let mut indexer = Indexer::new();
        let error =
            indexer.insert_context("geo", ContextSchema::of_kind("geohash")).unwrap_err();
        assert_eq!(error.code(), 410);
        assert!(indexer.schema.is_empty());
        assert!(indexer.index.is_empty());
    }
}
