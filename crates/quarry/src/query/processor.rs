use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::index::context_index::ContextIndex;
use crate::index::{RawResult, SearchMode};
use crate::intermediate::Intermediate;
use crate::occurrences::{Occurrences, Positions};
use crate::query::{fuzz, optimize, BinaryOp, FuzzyConfig, Query, TextSearch};
use crate::schema::{ContextKind, KindRegistry, Schema};
use crate::{Boost, Context, InternalError, Result, UserError, DEFAULT_BOOST};

/// Per-engine query configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub fuzzy: FuzzyConfig,
    /// Caps how many words of one raw result survive, rarer words first.
    /// Zero disables the cap.
    pub word_limit: usize,
    /// Stops walking a raw result once this many documents are covered.
    /// Zero disables the cap.
    pub doc_limit: usize,
    pub optimize: bool,
}

impl Default for ProcessConfig {
    fn default() -> ProcessConfig {
        ProcessConfig {
            fuzzy: FuzzyConfig::default(),
            word_limit: 0,
            doc_limit: 0,
            optimize: true,
        }
    }
}

/// Walks a query AST against the context index: normalizes terms per
/// context, dispatches index searches, applies word/doc limits, and
/// combines partial results through the intermediate algebra.
pub struct QueryProcessor<'a> {
    config: &'a ProcessConfig,
    schema: &'a Schema,
    index: &'a ContextIndex,
    registry: &'static KindRegistry,
    cancel: CancelToken,
}

impl<'a> QueryProcessor<'a> {
    pub fn new(
        config: &'a ProcessConfig,
        schema: &'a Schema,
        index: &'a ContextIndex,
    ) -> QueryProcessor<'a> {
        QueryProcessor {
            config,
            schema,
            index,
            registry: KindRegistry::standard(),
            cancel: CancelToken::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> QueryProcessor<'a> {
        self.cancel = cancel;
        self
    }

    pub fn process(&self, query: Query) -> Result<Intermediate> {
        let query = if self.config.optimize { optimize(query) } else { query };
        self.eval(&query, &self.schema.default_contexts())
    }

    fn eval(&self, query: &Query, actives: &[Context]) -> Result<Intermediate> {
        self.ensure_live()?;
        match query {
            Query::Word(TextSearch::Fuzzy, word) => self.eval_fuzzy(word, actives, false),
            Query::Word(search, word) => {
                let mode = match search {
                    TextSearch::Case => SearchMode::PrefixCase,
                    _ => SearchMode::PrefixNoCase,
                };
                self.eval_word(mode, word, actives)
            }
            Query::Phrase(TextSearch::Fuzzy, phrase) => self.eval_fuzzy(phrase, actives, true),
            Query::Phrase(search, phrase) => {
                let mode = match search {
                    TextSearch::Case => SearchMode::Case,
                    _ => SearchMode::NoCase,
                };
                self.eval_phrase(mode, phrase, actives)
            }
            Query::Context(contexts, inner) => {
                for context in contexts {
                    if !self.schema.contains(context) {
                        return Err(UserError::ContextNotFound(context.clone()).into());
                    }
                }
                self.eval(inner, contexts)
            }
            Query::Binary(op, left, right) => {
                let left = self.eval(left, actives)?;
                self.ensure_live()?;
                let right = self.eval(right, actives)?;
                Ok(match op {
                    BinaryOp::And => left.intersection(right),
                    BinaryOp::Or => left.union(right),
                    BinaryOp::AndNot => left.difference(&right),
                })
            }
            Query::Range(lo, hi) => self.eval_range(lo, hi, actives),
            Query::Boost(boost, inner) => {
                let mut result = self.eval(inner, actives)?;
                result.scale_boost(*boost);
                Ok(result)
            }
        }
    }

    fn eval_word(
        &self,
        mode: SearchMode,
        word: &str,
        actives: &[Context],
    ) -> Result<Intermediate> {
        let mut normalized = Vec::new();
        for context in actives {
            self.ensure_live()?;
            let term = self.normalize(context, word)?;
            normalized.push((context.clone(), term));
        }

        let searched = self.index.search_with_cxs_normalized(mode, &normalized)?;
        let tagged = searched
            .into_iter()
            .map(|(context, raw)| {
                let boost = self.weight_of(&context);
                (context, boost, self.limit_raw(raw))
            })
            .collect();
        Ok(Intermediate::from_list_cxs(&[word.to_string()], tagged))
    }

    /// The fuzzy set of the text, each member evaluated caseless, merged
    /// best-first.
    fn eval_fuzzy(
        &self,
        text: &str,
        actives: &[Context],
        phrase: bool,
    ) -> Result<Intermediate> {
        let mut variants = vec![text.to_string()];
        variants.extend(fuzz(&self.config.fuzzy, text).into_iter().map(|(word, _)| word));

        let mut list = Vec::new();
        for variant in variants {
            self.ensure_live()?;
            let evaluated = if phrase {
                self.eval_phrase(SearchMode::NoCase, &variant, actives)?
            } else {
                self.eval_word(SearchMode::PrefixNoCase, &variant, actives)?
            };
            list.push(evaluated);
        }
        Ok(Intermediate::merges(list))
    }

    fn eval_phrase(
        &self,
        mode: SearchMode,
        phrase: &str,
        actives: &[Context],
    ) -> Result<Intermediate> {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        if words.is_empty() {
            return Ok(Intermediate::new());
        }

        let mut results = Vec::new();
        for context in actives {
            self.ensure_live()?;
            if self.kind_of(context)?.name != "text" {
                return Err(UserError::CapabilityUnavailable(
                    "phrase search on a non-text context",
                )
                .into());
            }

            // start positions come from the first word, the tail filters
            let mut surviving = self.exact_occurrences(mode, context, words[0])?;
            for (offset, word) in words.iter().enumerate().skip(1) {
                if surviving.is_empty() {
                    break;
                }
                let next = self.exact_occurrences(mode, context, word)?;
                surviving = advance_phrase(surviving, &next, offset as u32);
            }

            if !surviving.is_empty() {
                let raw = vec![(phrase.to_string(), surviving)];
                results.push((context.clone(), self.weight_of(context), raw));
            }
        }
        Ok(Intermediate::from_list_cxs(&[phrase.to_string()], results))
    }

    fn eval_range(&self, lo: &str, hi: &str, actives: &[Context]) -> Result<Intermediate> {
        let mut results = Vec::new();
        for context in actives {
            self.ensure_live()?;
            let lo = self.normalize(context, lo)?;
            let hi = self.normalize(context, hi)?;
            let raw = self.index.lookup_range_cx(context, &lo, &hi)?;
            results.push((context.clone(), self.weight_of(context), self.limit_raw(raw)));
        }
        Ok(Intermediate::from_list_cxs(&[lo.to_string(), hi.to_string()], results))
    }

    /// Exact lookup of one phrase word, folding the postings of every
    /// matched casing into one occurrence map.
    fn exact_occurrences(
        &self,
        mode: SearchMode,
        context: &str,
        word: &str,
    ) -> Result<Occurrences> {
        let term = self.normalize(context, word)?;
        let raw = self.index.search_with_cx(mode, context, &term)?;
        Ok(raw
            .into_iter()
            .fold(Occurrences::new(), |folded, (_, occurrences)| folded.merge(occurrences)))
    }

    /// A term the context's validator rejects fails the whole query; a
    /// multi-context query is never silently narrowed.
    fn normalize(&self, context: &str, term: &str) -> Result<String> {
        self.kind_of(context)?.normalize_query(term).ok_or_else(|| {
            UserError::InvalidValue { context: context.to_string(), value: term.to_string() }
                .into()
        })
    }

    fn kind_of(&self, context: &str) -> Result<&'static ContextKind> {
        let schema = self
            .schema
            .get(context)
            .ok_or_else(|| UserError::ContextNotFound(context.to_string()))?;
        self.registry
            .get(&schema.kind)
            .ok_or_else(|| UserError::UnknownContextKind(schema.kind.clone()).into())
    }

    fn weight_of(&self, context: &str) -> Boost {
        self.schema.get(context).map(|schema| schema.weight).unwrap_or(DEFAULT_BOOST)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.cancel.get() {
            return Err(InternalError::QueryCancelled.into());
        }
        Ok(())
    }

    /// Word/doc limiting, applied in that order to each raw result.
    fn limit_raw(&self, raw: RawResult) -> RawResult {
        limit_words(self.config.word_limit, limit_docs(self.config.doc_limit, raw))
    }
}

/// Walks the result until the accumulated document count reaches the
/// limit, keeping the element that crosses it. Relies on the convention
/// that closer matches come first.
fn limit_docs(limit: usize, raw: RawResult) -> RawResult {
    if limit == 0 {
        return raw;
    }
    let mut covered = 0;
    let mut kept = Vec::new();
    for (word, occurrences) in raw {
        covered += occurrences.doc_count();
        kept.push((word, occurrences));
        if covered >= limit {
            break;
        }
    }
    kept
}

/// When too many words match, each is scored by its occurrence size and
/// the rarest `limit` survive. A plain frequency heuristic, not an IDF.
fn limit_words(limit: usize, raw: RawResult) -> RawResult {
    if limit == 0 || raw.len() <= limit {
        return raw;
    }
    let mut scored = raw;
    scored.sort_by_key(|(_, occurrences)| occurrences.doc_count());
    scored.truncate(limit);
    scored
}

/// Keeps the start positions whose phrase chain continues `offset` words
/// later in the same document.
fn advance_phrase(current: Occurrences, next: &Occurrences, offset: u32) -> Occurrences {
    let mut filtered = Occurrences::new();
    for (doc, positions) in current.iter() {
        if let Some(next_positions) = next.positions(doc) {
            let survivors: Positions = positions
                .iter()
                .filter(|&position| next_positions.contains(position + offset))
                .collect();
            filtered.add_positions(doc, survivors);
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use big_s::S;

    use super::*;
    use crate::index::AnyIndex;
    use crate::schema::ContextSchema;

    struct Fixture {
        schema: Schema,
        index: ContextIndex,
        config: ProcessConfig,
    }

    impl Fixture {
        fn new() -> Fixture {
            let mut schema = Schema::new();
            schema.insert("content", ContextSchema::text());
            schema.insert("subject", ContextSchema::text().with_weight(2.0));

            let mut index = ContextIndex::new();
            index.insert_context("content", AnyIndex::empty_text()).unwrap();
            index.insert_context("subject", AnyIndex::empty_text()).unwrap();

            Fixture { schema, index, config: ProcessConfig::default() }
        }

        fn with_dates(mut self) -> Fixture {
            self.schema
                .insert("published", ContextSchema::of_kind("date").with_default(false));
            self.index.insert_context("published", AnyIndex::empty_date()).unwrap();
            self
        }

        fn add(&mut self, context: &str, doc: crate::DocId, content: &str) {
            let mut entries = std::collections::BTreeMap::new();
            for (position, word) in crate::analyzer::tokenize_text(content) {
                entries
                    .entry(word)
                    .or_insert_with(Occurrences::new)
                    .insert(doc, position);
            }
            self.index.insert_list(context, entries.into_iter().collect()).unwrap();
        }

        fn run(&self, query: Query) -> Result<Intermediate> {
            QueryProcessor::new(&self.config, &self.schema, &self.index).process(query)
        }
    }

    #[test]
    fn word_queries_are_prefix_searches() {
        let mut fixture = Fixture::new();
        fixture.add("content", 1, "hello world");

        let found = fixture.run(Query::word("hel")).unwrap();
        assert_eq!(found.len(), 1);
        let words = &found.get(1).unwrap().contexts["content"];
        assert!(words.contains_key("hello"));
    }

    #[test]
    fn case_sensitive_word_queries_respect_case() {
        let mut fixture = Fixture::new();
        fixture.add("content", 1, "Hello world");

        assert!(fixture.run(Query::word_case("hel")).unwrap().is_empty());
        assert_eq!(fixture.run(Query::word("hel")).unwrap().len(), 1);
    }

    #[test]
    fn context_restriction_and_unknown_context() {
        let mut fixture = Fixture::new();
        fixture.add("subject", 1, "cat");
        fixture.add("content", 2, "dog");

        let restricted = fixture.run(Query::word_case("cat").within(&["content"])).unwrap();
        assert!(restricted.is_empty());

        let unrestricted = fixture.run(Query::word_case("cat")).unwrap();
        assert_eq!(unrestricted.get(1).unwrap().boost, 2.0);

        let missing = fixture.run(Query::word("cat").within(&["missing"])).unwrap_err();
        assert_eq!(missing.code(), 404);
    }

    #[test]
    fn invalid_term_for_a_context_fails_with_400() {
        let fixture = Fixture::new().with_dates();
        let error = fixture
            .run(Query::word("yesterday").within(&["published"]))
            .unwrap_err();
        assert_eq!(error.code(), 400);
    }

    #[test]
    fn binary_operators_combine_children() {
        let mut fixture = Fixture::new();
        fixture.add("content", 1, "x");
        fixture.add("content", 2, "x y");
        fixture.add("content", 3, "y");

        let and_not =
            fixture.run(Query::word_case("x").and_not(Query::word_case("y"))).unwrap();
        assert_eq!(and_not.doc_ids(), [1u32].into_iter().collect());

        let and = fixture.run(Query::word_case("x").and(Query::word_case("y"))).unwrap();
        assert_eq!(and.doc_ids(), [2u32].into_iter().collect());

        let or = fixture.run(Query::word_case("x").or(Query::word_case("y"))).unwrap();
        assert_eq!(or.len(), 3);
    }

    #[test]
    fn phrase_positions_are_the_matching_starts() {
        let mut fixture = Fixture::new();
        fixture.add("content", 1, "a b c a b");

        let found = fixture.run(Query::phrase_case("a b")).unwrap();
        let (_, positions) = &found.get(1).unwrap().contexts["content"]["a b"];
        assert_eq!(positions.iter().collect::<Vec<u32>>(), vec![0, 3]);

        let tail = fixture.run(Query::phrase_case("b c")).unwrap();
        let (_, positions) = &tail.get(1).unwrap().contexts["content"]["b c"];
        assert_eq!(positions.iter().collect::<Vec<u32>>(), vec![1]);

        assert!(fixture.run(Query::phrase_case("a c")).unwrap().is_empty());
    }

    #[test]
    fn one_word_phrase_degenerates_to_an_exact_word() {
        let mut fixture = Fixture::new();
        fixture.add("content", 1, "hello world");

        assert_eq!(fixture.run(Query::phrase_case("hello")).unwrap().len(), 1);
        // no prefix expansion for phrases
        assert!(fixture.run(Query::phrase_case("hel")).unwrap().is_empty());
        // a phrase longer than the document cannot match
        assert!(fixture
            .run(Query::phrase_case("hello world again"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn phrase_search_needs_a_text_context() {
        let fixture = Fixture::new().with_dates();
        let error = fixture
            .run(Query::phrase("2014-01-15 2014-01-16").within(&["published"]))
            .unwrap_err();
        assert_eq!(error.code(), 501);
    }

    #[test]
    fn range_queries_use_the_context_order() {
        let mut fixture = Fixture::new().with_dates();
        for (doc, date) in [(1, "2014-01-15"), (2, "2014-02-10"), (3, "2014-03-01")] {
            fixture
                .index
                .insert_list("published", vec![(S(date), Occurrences::singleton(doc, 0))])
                .unwrap();
        }

        let found = fixture
            .run(Query::range("2014-01-01", "2014-01-31").within(&["published"]))
            .unwrap();
        assert_eq!(found.doc_ids(), [1u32].into_iter().collect());

        let inverted = fixture
            .run(Query::range("2014-02-01", "2014-01-01").within(&["published"]))
            .unwrap();
        assert!(inverted.is_empty());
    }

    #[test]
    fn boosts_compose_by_multiplication() {
        let mut fixture = Fixture::new();
        fixture.add("subject", 1, "cat");

        let boosted = fixture
            .run(Query::word_case("cat").boost(3.0).boost(2.0))
            .unwrap();
        // 6.0 from the query times the context weight 2.0
        assert_eq!(boosted.get(1).unwrap().boost, 12.0);

        let identity = fixture.run(Query::word_case("cat").boost(1.0)).unwrap();
        assert_eq!(identity.get(1).unwrap().boost, 2.0);
    }

    #[test]
    fn fuzzy_queries_include_near_spellings() {
        let mut fixture = Fixture::new();
        fixture.add("content", 1, "color");

        // "colro" swaps back to "color"
        let found = fixture.run(Query::fuzzy_word("colro")).unwrap();
        assert_eq!(found.len(), 1);

        let mut strict = Fixture::new();
        strict.add("content", 1, "color");
        strict.config.fuzzy.max_fuzziness = 0.0;
        assert!(strict.run(Query::fuzzy_word("colro")).unwrap().is_empty());
    }

    #[test]
    fn empty_word_matches_everything_and_empty_phrase_nothing() {
        let mut fixture = Fixture::new();
        fixture.add("content", 1, "hello");
        fixture.add("content", 2, "world");

        assert_eq!(fixture.run(Query::word("")).unwrap().len(), 2);
        assert!(fixture.run(Query::phrase("")).unwrap().is_empty());
    }

    #[test]
    fn doc_limit_cuts_the_raw_result_after_the_crossing_word() {
        let mut fixture = Fixture::new();
        fixture.add("content", 1, "aaa");
        fixture.add("content", 2, "aab");
        fixture.add("content", 3, "aac");

        fixture.config.doc_limit = 2;
        let limited = fixture.run(Query::word_case("aa")).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn word_limit_keeps_the_rarest_words() {
        let mut fixture = Fixture::new();
        fixture.add("content", 1, "common");
        fixture.add("content", 2, "common");
        fixture.add("content", 3, "common commonest");

        fixture.config.word_limit = 1;
        let limited = fixture.run(Query::word_case("common")).unwrap();
        // the rarer "commonest" wins over "common"
        assert_eq!(limited.doc_ids(), [3u32].into_iter().collect());
    }

    #[test]
    fn cancellation_aborts_at_combinator_boundaries() {
        let mut fixture = Fixture::new();
        fixture.add("content", 1, "hello");

        let cancel = CancelToken::default();
        cancel.cancel();
        let processor = QueryProcessor::new(&fixture.config, &fixture.schema, &fixture.index)
            .with_cancel(cancel);
        let error = processor.process(Query::word("hello")).unwrap_err();
        assert_eq!(error.code(), 500);
    }
}
