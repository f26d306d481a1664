pub mod analyzer;
mod cancel;
pub mod doc_table;
pub mod document;
pub mod engine;
mod error;
pub mod index;
pub mod indexer;
pub mod intermediate;
pub mod occurrences;
pub mod query;
pub mod result;
pub mod schema;
pub mod store;

pub use self::cancel::CancelToken;
pub use self::doc_table::DocTable;
pub use self::document::Document;
pub use self::engine::{Command, CommandResult, Engine, StatusRequest};
pub use self::error::{CommandError, Error, InternalError, UserError};
pub use self::index::context_index::ContextIndex;
pub use self::index::{RawResult, SearchMode, TermIndex};
pub use self::indexer::Indexer;
pub use self::intermediate::Intermediate;
pub use self::occurrences::{Occurrences, Positions};
pub use self::query::processor::ProcessConfig;
pub use self::query::Query;
pub use self::result::{DocHit, LimitedResult, SearchResult, WordHit};
pub use self::schema::{ContextSchema, Schema};

pub type Result<T> = std::result::Result<T, error::Error>;

/// Internal document identifier. Minted by the document table on first
/// insert of a URI and never reused within a session.
pub type DocId = u32;

/// Name of an indexed field. A context owns its own analyzer, weight and
/// default-participation flag through the schema.
pub type Context = String;

/// A term as it is stored in a context index, after normalization.
pub type Word = String;

/// Additive ranking magnitude, assigned after materialization.
pub type Score = f32;

/// Multiplicative document weight. Strictly positive, composed by
/// multiplication with `1.0` as identity.
pub type Boost = f32;

/// Default boost for documents found in a context without a weight.
pub const DEFAULT_BOOST: Boost = 1.0;
