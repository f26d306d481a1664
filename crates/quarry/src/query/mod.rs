use serde::{Deserialize, Serialize};

use crate::{Boost, Context};

pub mod fuzzy;
pub mod processor;

pub use self::fuzzy::{fuzz, FuzzyConfig};

/// How the text of a word or phrase query is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextSearch {
    Case,
    NoCase,
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    And,
    Or,
    AndNot,
}

/// The query algebra evaluated by the processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Word(TextSearch, String),
    Phrase(TextSearch, String),
    Context(Vec<Context>, Box<Query>),
    Binary(BinaryOp, Box<Query>, Box<Query>),
    Range(String, String),
    Boost(Boost, Box<Query>),
}

impl Query {
    pub fn word(text: &str) -> Query {
        Query::Word(TextSearch::NoCase, text.to_string())
    }

    pub fn word_case(text: &str) -> Query {
        Query::Word(TextSearch::Case, text.to_string())
    }

    pub fn fuzzy_word(text: &str) -> Query {
        Query::Word(TextSearch::Fuzzy, text.to_string())
    }

    pub fn phrase(text: &str) -> Query {
        Query::Phrase(TextSearch::NoCase, text.to_string())
    }

    pub fn phrase_case(text: &str) -> Query {
        Query::Phrase(TextSearch::Case, text.to_string())
    }

    pub fn range(lo: &str, hi: &str) -> Query {
        Query::Range(lo.to_string(), hi.to_string())
    }

    pub fn within(self, contexts: &[&str]) -> Query {
        let contexts = contexts.iter().map(|context| context.to_string()).collect();
        Query::Context(contexts, Box::new(self))
    }

    pub fn and(self, other: Query) -> Query {
        Query::Binary(BinaryOp::And, Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Query) -> Query {
        Query::Binary(BinaryOp::Or, Box::new(self), Box::new(other))
    }

    pub fn and_not(self, other: Query) -> Query {
        Query::Binary(BinaryOp::AndNot, Box::new(self), Box::new(other))
    }

    pub fn boost(self, boost: Boost) -> Query {
        Query::Boost(boost, Box::new(self))
    }
}

/// Semantics-preserving rewriting before evaluation: nested boosts fold
/// into one multiplication, identity boosts disappear, and chains of one
/// commutative operator are re-associated to the left. Idempotent, and
/// never required for correctness.
pub fn optimize(query: Query) -> Query {
    match query {
        Query::Word(..) | Query::Phrase(..) | Query::Range(..) => query,
        Query::Context(contexts, inner) => {
            Query::Context(contexts, Box::new(optimize(*inner)))
        }
        Query::Boost(boost, inner) => match optimize(*inner) {
            Query::Boost(nested, inner) => fold_boost(boost * nested, *inner),
            inner => fold_boost(boost, inner),
        },
        Query::Binary(op, left, right) => {
            let mut chain = Vec::new();
            flatten(op, *left, &mut chain);
            flatten(op, *right, &mut chain);
            let mut chain = chain.into_iter();
            let first = chain.next().expect("binary chain is never empty");
            chain.fold(first, |folded, next| {
                Query::Binary(op, Box::new(folded), Box::new(next))
            })
        }
    }
}

fn fold_boost(boost: Boost, inner: Query) -> Query {
    if boost == 1.0 {
        inner
    } else {
        Query::Boost(boost, Box::new(inner))
    }
}

fn flatten(op: BinaryOp, query: Query, chain: &mut Vec<Query>) {
    match query {
        // AndNot is not associative; its chains are never flattened and
        // both sides stay opaque
        Query::Binary(inner_op, left, right) if inner_op == op && op != BinaryOp::AndNot => {
            flatten(op, *left, chain);
            flatten(op, *right, chain);
        }
        other => chain.push(optimize(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_boost_disappears() {
        let query = Query::word("hello").boost(1.0);
        assert_eq!(optimize(query), Query::word("hello"));
    }

    #[test]
    fn nested_boosts_fold_by_multiplication() {
        let query = Query::word("hello").boost(3.0).boost(2.0);
        assert_eq!(optimize(query), Query::word("hello").boost(6.0));
    }

    #[test]
    fn same_operator_chains_reassociate_left() {
        let a = Query::word("a");
        let b = Query::word("b");
        let c = Query::word("c");

        let right_leaning = a.clone().or(b.clone().or(c.clone()));
        let left_leaning = a.or(b).or(c);
        assert_eq!(optimize(right_leaning), left_leaning);
    }

    #[test]
    fn and_not_chains_are_left_alone() {
        let right_nested =
            Query::word("a").and_not(Query::word("b").and_not(Query::word("c")));
        assert_eq!(optimize(right_nested.clone()), right_nested);

        let left_nested =
            Query::word("a").and_not(Query::word("b")).and_not(Query::word("c"));
        assert_eq!(optimize(left_nested.clone()), left_nested);
    }

    #[test]
    fn optimize_is_idempotent() {
        let query = Query::word("a")
            .or(Query::word("b").or(Query::word("c")))
            .and(Query::word("d").boost(2.0).boost(1.0))
            .within(&["content"]);
        let once = optimize(query);
        assert_eq!(optimize(once.clone()), once);
    }
}
