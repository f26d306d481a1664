use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::analyzer;
use crate::index::AnyIndex;
use crate::{Boost, Context};

/// A registered context kind: how content of that kind is tokenized and
/// normalized, and which index variant an empty context of that kind
/// starts from.
pub struct ContextKind {
    pub name: &'static str,
    new_index: fn() -> AnyIndex,
    tokenize: fn(&str) -> Vec<(u32, String)>,
    normalize_query: fn(&str) -> Option<String>,
    normalize_value: fn(&str) -> Option<String>,
}

impl ContextKind {
    pub fn new_index(&self) -> AnyIndex {
        (self.new_index)()
    }

    pub fn tokenize(&self, content: &str) -> Vec<(u32, String)> {
        (self.tokenize)(content)
    }

    /// Canonicalizes a query term. `None` means the term is not a valid
    /// value for this kind.
    pub fn normalize_query(&self, term: &str) -> Option<String> {
        (self.normalize_query)(term)
    }

    /// Canonicalizes a document token. Stricter than the query side for
    /// kinds whose queries accept prefixes.
    pub fn normalize_value(&self, token: &str) -> Option<String> {
        (self.normalize_value)(token)
    }
}

static STANDARD_KINDS: Lazy<KindRegistry> = Lazy::new(|| {
    KindRegistry::with_kinds(vec![
        ContextKind {
            name: "text",
            new_index: AnyIndex::empty_text,
            tokenize: analyzer::tokenize_text,
            normalize_query: analyzer::normalize_text,
            normalize_value: analyzer::normalize_text,
        },
        ContextKind {
            name: "int",
            new_index: AnyIndex::empty_int,
            tokenize: analyzer::tokenize_value,
            normalize_query: analyzer::normalize_int,
            normalize_value: analyzer::normalize_int,
        },
        ContextKind {
            name: "date",
            new_index: AnyIndex::empty_date,
            tokenize: analyzer::tokenize_value,
            normalize_query: analyzer::normalize_date,
            normalize_value: analyzer::normalize_date_value,
        },
        ContextKind {
            name: "position",
            new_index: AnyIndex::empty_position,
            tokenize: analyzer::tokenize_value,
            normalize_query: analyzer::normalize_position,
            normalize_value: analyzer::normalize_position,
        },
    ])
});

/// The live context-kind records. Persisted schemas reference kinds by
/// name and are re-linked against this on load.
pub struct KindRegistry {
    kinds: BTreeMap<&'static str, ContextKind>,
}

impl KindRegistry {
    pub fn with_kinds(kinds: Vec<ContextKind>) -> KindRegistry {
        KindRegistry { kinds: kinds.into_iter().map(|kind| (kind.name, kind)).collect() }
    }

    pub fn standard() -> &'static KindRegistry {
        &STANDARD_KINDS
    }

    pub fn get(&self, name: &str) -> Option<&ContextKind> {
        self.kinds.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.kinds.keys().copied().collect()
    }
}

/// Per-context configuration: the kind (by registry name), the ranking
/// weight applied as boost to documents found in this context, and
/// whether the context participates in queries that name no context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSchema {
    pub kind: String,
    pub weight: Boost,
    pub default: bool,
}

impl ContextSchema {
    pub fn of_kind(kind: &str) -> ContextSchema {
        ContextSchema { kind: kind.to_string(), weight: 1.0, default: true }
    }

    pub fn text() -> ContextSchema {
        ContextSchema::of_kind("text")
    }

    pub fn with_weight(mut self, weight: Boost) -> ContextSchema {
        self.weight = weight;
        self
    }

    pub fn with_default(mut self, default: bool) -> ContextSchema {
        self.default = default;
        self
    }
}

impl Default for ContextSchema {
    fn default() -> ContextSchema {
        ContextSchema::text()
    }
}

/// The authority for which contexts exist and how their terms are
/// analyzed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    contexts: BTreeMap<Context, ContextSchema>,
}

impl Schema {
    pub fn new() -> Schema {
        Schema::default()
    }

    pub fn insert(&mut self, context: &str, schema: ContextSchema) {
        self.contexts.insert(context.to_string(), schema);
    }

    pub fn remove(&mut self, context: &str) -> Option<ContextSchema> {
        self.contexts.remove(context)
    }

    pub fn get(&self, context: &str) -> Option<&ContextSchema> {
        self.contexts.get(context)
    }

    pub fn contains(&self, context: &str) -> bool {
        self.contexts.contains_key(context)
    }

    pub fn contexts(&self) -> Vec<&str> {
        self.contexts.keys().map(String::as_str).collect()
    }

    /// The contexts a query without an explicit context restriction runs
    /// against.
    pub fn default_contexts(&self) -> Vec<Context> {
        self.contexts
            .iter()
            .filter(|(_, schema)| schema.default)
            .map(|(context, _)| context.clone())
            .collect()
    }

    /// Every kind name the schema references, for the persisted tag list.
    pub fn kind_names(&self) -> BTreeSet<String> {
        self.contexts.values().map(|schema| schema.kind.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextSchema)> + '_ {
        self.contexts.iter().map(|(context, schema)| (context.as_str(), schema))
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_knows_the_four_kinds() {
        let registry = KindRegistry::standard();
        assert_eq!(registry.names(), vec!["date", "int", "position", "text"]);
        assert!(registry.get("geo").is_none());
    }

    #[test]
    fn minted_indexes_match_their_kind() {
        let registry = KindRegistry::standard();
        for name in registry.names() {
            let index = registry.get(name).unwrap().new_index();
            assert_eq!(index.kind_name(), name);
            assert!(index.is_empty());
        }
    }

    #[test]
    fn default_contexts_follow_the_flag() {
        let mut schema = Schema::new();
        schema.insert("subject", ContextSchema::text().with_weight(2.0));
        schema.insert("hidden", ContextSchema::text().with_default(false));
        schema.insert("published", ContextSchema::of_kind("date"));

        assert_eq!(schema.default_contexts(), vec!["published", "subject"]);
        assert_eq!(schema.kind_names().len(), 2);
    }
}
