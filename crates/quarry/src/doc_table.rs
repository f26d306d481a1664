use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::document::{Document, DocumentPayload};
use crate::occurrences::DocIdSet;
use crate::DocId;

/// The authority for document existence: maps `DocId` to stored payload
/// and URI to `DocId`. Identifiers come from a monotone counter and are
/// never reused within a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocTable {
    documents: BTreeMap<DocId, DocumentPayload>,
    uris: BTreeMap<String, DocId>,
    next_id: DocId,
}

impl DocTable {
    pub fn new() -> DocTable {
        DocTable::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn lookup(&self, id: DocId) -> Option<Document> {
        self.documents.get(&id).map(DocumentPayload::unwrap)
    }

    pub fn lookup_by_uri(&self, uri: &str) -> Option<(DocId, Document)> {
        let id = self.doc_id_of(uri)?;
        self.lookup(id).map(|document| (id, document))
    }

    pub fn doc_id_of(&self, uri: &str) -> Option<DocId> {
        self.uris.get(uri).copied()
    }

    pub fn contains_uri(&self, uri: &str) -> bool {
        self.uris.contains_key(uri)
    }

    /// Inserts a document, minting a fresh identifier. Idempotent on the
    /// URI: when it is already present its existing identifier is
    /// returned and the table is left unchanged.
    pub fn insert(&mut self, document: &Document) -> DocId {
        if let Some(id) = self.doc_id_of(&document.uri) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.uris.insert(document.uri.clone(), id);
        self.documents.insert(id, DocumentPayload::wrap(document));
        id
    }

    /// Replaces the document stored under an existing identifier.
    pub fn update(&mut self, id: DocId, document: &Document) {
        if let Some(old) = self.documents.insert(id, DocumentPayload::wrap(document)) {
            let old_uri = old.unwrap().uri;
            if old_uri != document.uri {
                self.uris.remove(&old_uri);
            }
        }
        self.uris.insert(document.uri.clone(), id);
    }

    /// Rewrites one document in place; a no-op for unknown identifiers.
    pub fn adjust(&mut self, id: DocId, f: impl FnOnce(Document) -> Document) {
        if let Some(document) = self.lookup(id) {
            self.update(id, &f(document));
        }
    }

    pub fn adjust_by_uri(&mut self, uri: &str, f: impl FnOnce(Document) -> Document) {
        if let Some(id) = self.doc_id_of(uri) {
            self.adjust(id, f);
        }
    }

    pub fn delete(&mut self, id: DocId) -> Option<Document> {
        let document = self.documents.remove(&id)?.unwrap();
        self.uris.remove(&document.uri);
        Some(document)
    }

    pub fn delete_by_uri(&mut self, uri: &str) -> Option<Document> {
        let id = self.doc_id_of(uri)?;
        self.delete(id)
    }

    /// Bulk removal of every document in `ids`; missing ones are ignored.
    pub fn difference(&mut self, ids: &DocIdSet) {
        for id in ids.iter() {
            self.delete(id);
        }
    }

    pub fn difference_by_uri(&mut self, uris: &BTreeSet<String>) {
        for uri in uris {
            self.delete_by_uri(uri);
        }
    }

    /// Rewrites every stored document.
    pub fn map(&mut self, mut f: impl FnMut(Document) -> Document) {
        let ids: Vec<DocId> = self.documents.keys().copied().collect();
        for id in ids {
            self.adjust(id, &mut f);
        }
    }

    /// Keeps only the documents the predicate accepts.
    pub fn filter(&mut self, mut predicate: impl FnMut(DocId, &Document) -> bool) {
        let ids: Vec<DocId> = self.documents.keys().copied().collect();
        for id in ids {
            if let Some(document) = self.lookup(id) {
                if !predicate(id, &document) {
                    self.delete(id);
                }
            }
        }
    }

    /// Merges another table into this one. Precondition: the identifier
    /// and URI sets are disjoint.
    pub fn union(&mut self, other: DocTable) {
        for (id, payload) in other.documents {
            let uri = payload.unwrap().uri;
            self.uris.insert(uri, id);
            self.documents.insert(id, payload);
        }
        self.next_id = self.next_id.max(other.next_id);
    }

    /// Renumbers every document. Precondition: `f` is injective on the
    /// stored identifiers.
    pub fn map_keys(&mut self, f: impl Fn(DocId) -> DocId) {
        let documents = std::mem::take(&mut self.documents);
        let mut next_id = self.next_id;
        self.documents = documents
            .into_iter()
            .map(|(id, payload)| {
                let id = f(id);
                next_id = next_id.max(id + 1);
                (id, payload)
            })
            .collect();
        for id in self.uris.values_mut() {
            *id = f(*id);
        }
        self.next_id = next_id;
    }

    pub fn doc_ids(&self) -> DocIdSet {
        self.documents.keys().copied().collect()
    }

    pub fn to_map(&self) -> BTreeMap<DocId, Document> {
        self.documents.iter().map(|(id, payload)| (*id, payload.unwrap())).collect()
    }
}
