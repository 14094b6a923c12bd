//! Data types for chunks, stored vectors, and search results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered string-keyed metadata with scalar JSON values.
pub type Metadata = Map<String, Value>;

/// Metadata key holding the source document identifier.
pub const DOC_ID_KEY: &str = "doc_id";
/// Metadata key holding the source document name.
pub const DOC_NAME_KEY: &str = "doc_name";
/// Metadata key holding the source document type.
pub const DOC_TYPE_KEY: &str = "doc_type";
/// Metadata key holding a chunk's 0-based position within its document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
/// Metadata key under which a stored vector keeps its chunk text.
pub const TEXT_KEY: &str = "text";

/// A raw document submitted for ingestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentInput {
    /// The document's full text.
    #[serde(default)]
    pub text: String,
    /// Human-readable document name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Document type, e.g. `pdf`, `web`, `text_file`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
}

impl DocumentInput {
    /// Create a document with no name or type.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Default::default() }
    }

    /// Set the document name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the document type.
    pub fn with_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }
}

/// A bounded segment of a source document, ready to be embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The trimmed, non-empty text of the chunk.
    pub text: String,
    /// Source metadata plus `chunk_index`.
    pub metadata: Metadata,
}

impl Chunk {
    /// Return the chunk's `chunk_index` metadata value, if present.
    pub fn chunk_index(&self) -> Option<u64> {
        self.metadata.get(CHUNK_INDEX_KEY).and_then(Value::as_u64)
    }

    /// Return the chunk's `doc_id` metadata value, if present.
    pub fn doc_id(&self) -> Option<&str> {
        self.metadata.get(DOC_ID_KEY).and_then(Value::as_str)
    }
}

/// A vector as stored in a similarity index.
///
/// `metadata` carries every chunk metadata key plus the chunk text under
/// [`TEXT_KEY`], so search hits can be rendered without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    /// Identifier shared with the originating [`Chunk`].
    pub id: String,
    /// The embedding.
    pub values: Vec<f32>,
    /// Stored metadata, including the chunk text.
    pub metadata: Metadata,
}

impl VectorRecord {
    /// Build a record from a chunk and its embedding.
    pub fn from_chunk(chunk: &Chunk, values: Vec<f32>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(TEXT_KEY.to_string(), Value::String(chunk.text.clone()));
        for (key, value) in &chunk.metadata {
            metadata.insert(key.clone(), value.clone());
        }
        Self { id: chunk.id.clone(), values, metadata }
    }
}

/// A raw nearest-neighbour match returned by a [`VectorStore`](crate::VectorStore).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    /// Identifier of the matched vector.
    pub id: String,
    /// Cosine similarity (higher is more relevant).
    pub score: f32,
    /// Stored metadata, including the chunk text.
    pub metadata: Metadata,
}

/// A retrieved chunk paired with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Identifier of the matched chunk.
    pub id: String,
    /// The similarity score (higher is more relevant).
    pub score: f32,
    /// The chunk text.
    pub text: String,
    /// Chunk metadata without the text.
    pub metadata: Metadata,
}

impl From<ScoredRecord> for SearchResult {
    fn from(record: ScoredRecord) -> Self {
        let mut metadata = record.metadata;
        let text = match metadata.remove(TEXT_KEY) {
            Some(Value::String(text)) => text,
            _ => String::new(),
        };
        Self { id: record.id, score: record.score, text, metadata }
    }
}
