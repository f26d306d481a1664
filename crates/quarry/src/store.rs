use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use tracing::info;

use crate::indexer::Indexer;
use crate::schema::KindRegistry;
use crate::{InternalError, Result, UserError};

/// Writes the whole indexer as a binary stream: the context-kind tag
/// list first, then the indexer itself. The tag list lets a loader
/// reject a dump before touching the payload.
pub fn store_indexer(indexer: &Indexer, path: &Path) -> Result<()> {
    let tags: Vec<String> = indexer.schema.kind_names().into_iter().collect();
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, &tags)?;
    bincode::serialize_into(&mut writer, indexer)?;
    info!(path = %path.display(), contexts = indexer.schema.len(), "stored indexer");
    Ok(())
}

/// Restores an indexer, re-linking every schema kind against the live
/// registry by name. A kind the registry does not know fails the load.
pub fn load_indexer(path: &Path) -> Result<Indexer> {
    let registry = KindRegistry::standard();
    let mut reader = BufReader::new(File::open(path)?);

    let tags: Vec<String> = bincode::deserialize_from(&mut reader)?;
    for tag in &tags {
        if !registry.contains(tag) {
            return Err(UserError::UnknownContextKind(tag.clone()).into());
        }
    }

    let indexer: Indexer = bincode::deserialize_from(&mut reader)?;
    for (context, schema) in indexer.schema.iter() {
        if !registry.contains(&schema.kind) {
            return Err(UserError::UnknownContextKind(schema.kind.clone()).into());
        }
        if !indexer.index.has_context(context) {
            return Err(InternalError::ContextOutOfSync(context.to_string()).into());
        }
    }

    info!(path = %path.display(), documents = indexer.docs.len(), "loaded indexer");
    Ok(indexer)
}
