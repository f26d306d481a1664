use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::document::Document;
use crate::indexer::Indexer;
use crate::query::processor::{ProcessConfig, QueryProcessor};
use crate::query::Query;
use crate::result::{materialize, rank, DocHit, LimitedResult};
use crate::schema::ContextSchema;
use crate::store;
use crate::{Context, DocId, Error, Result, Score, UserError, Word};

/// The control-plane surface the core consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Search { query: Query, offset: usize, limit: usize },
    Completion { query: Query, limit: usize },
    Insert(Document),
    Update(Document),
    BatchDelete(BTreeSet<String>),
    InsertContext { context: Context, schema: ContextSchema },
    DeleteContext { context: Context },
    StoreIx { path: PathBuf },
    LoadIx { path: PathBuf },
    Sequence(Vec<Command>),
    Noop,
    Status(StatusRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusRequest {
    DocTable,
    Index,
    Context(Context),
}

impl Command {
    /// Whether the command needs the writer token. `Sequence` always
    /// takes it; its children may mutate.
    fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::Insert(_)
                | Command::Update(_)
                | Command::BatchDelete(_)
                | Command::InsertContext { .. }
                | Command::DeleteContext { .. }
                | Command::LoadIx { .. }
                | Command::Sequence(_)
        )
    }
}

/// A found document, ready for the control plane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedDoc {
    pub id: DocId,
    pub uri: String,
    pub score: Score,
    pub fields: Map<String, Value>,
    pub contexts: BTreeMap<Context, BTreeMap<Word, Vec<u32>>>,
}

impl RankedDoc {
    fn from_hit(id: DocId, hit: DocHit) -> RankedDoc {
        let contexts = hit
            .contexts
            .into_iter()
            .map(|(context, words)| {
                let words = words
                    .into_iter()
                    .map(|(word, positions)| (word, positions.iter().collect()))
                    .collect();
                (context, words)
            })
            .collect();
        RankedDoc {
            id,
            uri: hit.info.document.uri,
            score: hit.info.score,
            fields: hit.info.document.fields,
            contexts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub word: Word,
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CommandResult {
    Ok,
    Documents(LimitedResult<RankedDoc>),
    Completions(Vec<Completion>),
    Status(Value),
    Sequence(Vec<CommandResult>),
}

/// One live indexer, single writer, snapshot readers.
///
/// Readers load the published `Arc` and never block. A writer takes the
/// token, clones the live indexer, applies the whole command to the
/// working copy and publishes it only on success; the token is released
/// on every exit path by drop.
pub struct Engine {
    live: ArcSwap<Indexer>,
    write_token: Mutex<()>,
    config: ProcessConfig,
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}

impl Engine {
    pub fn new() -> Engine {
        Engine::with_config(ProcessConfig::default())
    }

    pub fn with_config(config: ProcessConfig) -> Engine {
        Engine {
            live: ArcSwap::from_pointee(Indexer::new()),
            write_token: Mutex::new(()),
            config,
        }
    }

    /// A consistent view of the indexer, unaffected by later writes.
    pub fn snapshot(&self) -> Arc<Indexer> {
        self.live.load_full()
    }

    pub fn run(&self, command: Command) -> Result<CommandResult> {
        self.run_with_cancel(command, CancelToken::default())
    }

    pub fn run_with_cancel(
        &self,
        command: Command,
        cancel: CancelToken,
    ) -> Result<CommandResult> {
        if command.is_mutation() {
            let _token = self
                .write_token
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let mut working = Indexer::clone(&self.live.load_full());
            let result = self.apply(&mut working, command, &cancel)?;
            self.live.store(Arc::new(working));
            Ok(result)
        } else {
            self.read(&self.snapshot(), command, &cancel)
        }
    }

    /// Applies one command to the working copy. Nothing of the working
    /// copy is published when this errors, so a failed command never
    /// partially mutates the indexer.
    fn apply(
        &self,
        indexer: &mut Indexer,
        command: Command,
        cancel: &CancelToken,
    ) -> Result<CommandResult> {
        match command {
            Command::Insert(document) => {
                indexer.insert_document(&document)?;
                Ok(CommandResult::Ok)
            }
            Command::Update(document) => {
                indexer.update_document(&document)?;
                Ok(CommandResult::Ok)
            }
            Command::BatchDelete(uris) => {
                indexer.batch_delete(&uris);
                Ok(CommandResult::Ok)
            }
            Command::InsertContext { context, schema } => {
                indexer.insert_context(&context, schema)?;
                Ok(CommandResult::Ok)
            }
            Command::DeleteContext { context } => {
                indexer.delete_context(&context);
                Ok(CommandResult::Ok)
            }
            Command::LoadIx { path } => {
                *indexer = store::load_indexer(&path)?;
                Ok(CommandResult::Ok)
            }
            Command::Sequence(children) => {
                debug!(children = children.len(), "running sequence");
                let mut results = Vec::new();
                for (index, child) in children.into_iter().enumerate() {
                    match self.apply(indexer, child, cancel) {
                        Ok(result) => results.push(result),
                        Err(source) => {
                            return Err(Error::Sequence { index, source: Box::new(source) })
                        }
                    }
                }
                Ok(CommandResult::Sequence(results))
            }
            read_only => self.read(indexer, read_only, cancel),
        }
    }

    fn read(
        &self,
        indexer: &Indexer,
        command: Command,
        cancel: &CancelToken,
    ) -> Result<CommandResult> {
        match command {
            Command::Search { query, offset, limit } => {
                self.search(indexer, query, offset, limit, cancel)
            }
            Command::Completion { query, limit } => {
                self.completion(indexer, query, limit, cancel)
            }
            Command::StoreIx { path } => {
                store::store_indexer(indexer, &path)?;
                Ok(CommandResult::Ok)
            }
            Command::Noop => Ok(CommandResult::Ok),
            Command::Status(request) => status(indexer, request),
            _ => unreachable!("mutations are routed through apply"),
        }
    }

    fn search(
        &self,
        indexer: &Indexer,
        query: Query,
        offset: usize,
        limit: usize,
        cancel: &CancelToken,
    ) -> Result<CommandResult> {
        let processor = QueryProcessor::new(&self.config, &indexer.schema, &indexer.index)
            .with_cancel(cancel.clone());
        let intermediate = processor.process(query)?;

        let mut result = materialize(intermediate, &indexer.docs);
        rank(&mut result);

        let mut hits: Vec<RankedDoc> = result
            .doc_hits
            .into_iter()
            .map(|(id, hit)| RankedDoc::from_hit(id, hit))
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));

        Ok(CommandResult::Documents(LimitedResult::page(hits, offset, limit)))
    }

    /// Word completions of the query, best first.
    fn completion(
        &self,
        indexer: &Indexer,
        query: Query,
        limit: usize,
        cancel: &CancelToken,
    ) -> Result<CommandResult> {
        let processor = QueryProcessor::new(&self.config, &indexer.schema, &indexer.index)
            .with_cancel(cancel.clone());
        let intermediate = processor.process(query)?;

        let mut result = materialize(intermediate, &indexer.docs);
        rank(&mut result);

        let mut completions: Vec<Completion> = result
            .word_hits
            .into_iter()
            .map(|(word, hit)| Completion { word, score: hit.info.score })
            .collect();
        completions
            .sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.word.cmp(&b.word)));
        if limit > 0 {
            completions.truncate(limit);
        }
        Ok(CommandResult::Completions(completions))
    }
}

fn status(indexer: &Indexer, request: StatusRequest) -> Result<CommandResult> {
    let value = match request {
        StatusRequest::DocTable => json!({
            "documents": indexer.docs.len(),
        }),
        StatusRequest::Index => {
            let contexts: Map<String, Value> = indexer
                .index
                .contexts()
                .into_iter()
                .map(|context| {
                    let terms = indexer.index.term_count(context);
                    (context.to_string(), json!({ "terms": terms }))
                })
                .collect();
            json!({
                "documents": indexer.docs.len(),
                "contexts": contexts,
            })
        }
        StatusRequest::Context(context) => {
            let schema = indexer
                .schema
                .get(&context)
                .ok_or_else(|| UserError::ContextNotFound(context.clone()))?;
            json!({
                "kind": schema.kind,
                "weight": schema.weight,
                "default": schema.default,
                "terms": indexer.index.term_count(&context),
            })
        }
    };
    Ok(CommandResult::Status(value))
}
