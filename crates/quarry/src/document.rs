use std::collections::BTreeMap;
use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Context;

/// A document as handed to the ingestion commands: a unique URI, the
/// per-context content to index, and the stored fields returned with
/// hits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub uri: String,
    pub index: BTreeMap<Context, String>,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(uri: impl Into<String>) -> Document {
        Document { uri: uri.into(), index: BTreeMap::new(), fields: Map::new() }
    }

    pub fn indexed(mut self, context: &str, content: &str) -> Document {
        self.index.insert(context.to_string(), content.to_string());
        self
    }

    pub fn stored(mut self, field: &str, value: impl Into<Value>) -> Document {
        self.fields.insert(field.to_string(), value.into());
        self
    }
}

/// The stored form of a document inside the table: deflate-compressed
/// JSON. The stored fields are arbitrary JSON values, which rules out a
/// non-self-describing encoding here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPayload(Vec<u8>);

impl DocumentPayload {
    pub fn wrap(document: &Document) -> DocumentPayload {
        let raw = serde_json::to_vec(document).expect("document encoding");
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).expect("document compression");
        DocumentPayload(encoder.finish().expect("document compression"))
    }

    pub fn unwrap(&self) -> Document {
        let mut decoder = DeflateDecoder::new(self.0.as_slice());
        let mut raw = Vec::new();
        decoder.read_to_end(&mut raw).expect("document decompression");
        serde_json::from_slice(&raw).expect("document decoding")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn payload_round_trips() {
        let document = Document::new("id://1")
            .indexed("content", "hello world")
            .stored("title", json!("greetings"));
        assert_eq!(DocumentPayload::wrap(&document).unwrap(), document);
    }
}
