//! Document chunking.
//!
//! [`SentenceChunker`] walks text in fixed-size character windows and pulls
//! each cut back to the nearest sentence terminator within a short lookback.
//! [`DocumentProcessor`] wraps any [`Chunker`] and stamps the document-level
//! metadata every stored chunk must carry.

use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::document::{
    CHUNK_INDEX_KEY, Chunk, DOC_ID_KEY, DOC_NAME_KEY, DOC_TYPE_KEY, DocumentInput, Metadata,
};
use crate::error::Result;

/// How far back from a nominal boundary to look for a sentence terminator.
const SENTENCE_LOOKBACK: usize = 100;

/// Default document name when none is supplied.
pub const DEFAULT_DOC_NAME: &str = "Unknown";

/// Default document type when none is supplied.
pub const DEFAULT_DOC_TYPE: &str = "text";

/// A strategy for splitting text into chunks.
pub trait Chunker: Send + Sync {
    /// Split `text` into chunks, copying `metadata` onto each one.
    ///
    /// Returns an empty `Vec` if the text is empty or whitespace-only. Every
    /// chunk gets a fresh id and a `chunk_index` equal to its position in the
    /// returned `Vec`.
    fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk>;
}

/// Splits text into overlapping, sentence-boundary-aware chunks.
///
/// # Example
///
/// ```rust,ignore
/// use jarvis_rag::SentenceChunker;
///
/// let chunker = SentenceChunker::new(500, 50);
/// let chunks = chunker.chunk(&text, &Metadata::new());
/// ```
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SentenceChunker {
    /// Create a new `SentenceChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - nominal characters per chunk (a size of 0 is treated as 1)
    /// * `chunk_overlap` - characters shared between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }

    /// Compute the untrimmed character ranges of each window.
    ///
    /// Consecutive ranges overlap by at most `chunk_overlap` characters and
    /// every range starts strictly after the previous one, so the walk always
    /// terminates.
    pub(crate) fn windows(&self, chars: &[char]) -> Vec<Range<usize>> {
        let len = chars.len();
        let mut windows = Vec::new();
        let mut start = 0;

        while start < len {
            let nominal_end = start + self.chunk_size;
            let end = if nominal_end >= len {
                len
            } else {
                let floor = start.max(nominal_end.saturating_sub(SENTENCE_LOOKBACK));
                ((floor + 1)..=nominal_end)
                    .rev()
                    .find(|&i| is_sentence_terminal(chars[i]))
                    .map_or(nominal_end, |i| i + 1)
            };

            windows.push(start..end);
            if end >= len {
                break;
            }

            let next = end.saturating_sub(self.chunk_overlap);
            start = if next > start { next } else { end };
        }

        windows
    }
}

fn is_sentence_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '\n')
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            warn!("empty text provided for chunking");
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let mut chunks: Vec<Chunk> = Vec::new();

        for window in self.windows(&chars) {
            let raw: String = chars[window].iter().collect();
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }

            let mut chunk_metadata = metadata.clone();
            chunk_metadata.insert(CHUNK_INDEX_KEY.to_string(), Value::from(chunks.len()));
            chunks.push(Chunk {
                id: Uuid::new_v4().to_string(),
                text: trimmed.to_string(),
                metadata: chunk_metadata,
            });
        }

        info!(chunk_count = chunks.len(), "created chunks from text");
        chunks
    }
}

/// Turns whole documents into chunks carrying `doc_id`, `doc_name`, and `doc_type`.
#[derive(Clone)]
pub struct DocumentProcessor {
    chunker: Arc<dyn Chunker>,
}

impl std::fmt::Debug for DocumentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentProcessor").finish_non_exhaustive()
    }
}

impl DocumentProcessor {
    /// Create a processor around the given chunker.
    pub fn new(chunker: Arc<dyn Chunker>) -> Self {
        Self { chunker }
    }

    /// Chunk one document.
    ///
    /// A missing `doc_id` is generated; missing name and type default to
    /// `"Unknown"` and `"text"`.
    pub fn process_document(
        &self,
        text: &str,
        doc_id: Option<&str>,
        doc_name: Option<&str>,
        doc_type: Option<&str>,
    ) -> Vec<Chunk> {
        let doc_id = doc_id.map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
        let doc_name = doc_name.unwrap_or(DEFAULT_DOC_NAME);

        let mut metadata = Metadata::new();
        metadata.insert(DOC_ID_KEY.to_string(), Value::from(doc_id.as_str()));
        metadata.insert(DOC_NAME_KEY.to_string(), Value::from(doc_name));
        metadata.insert(DOC_TYPE_KEY.to_string(), Value::from(doc_type.unwrap_or(DEFAULT_DOC_TYPE)));

        let chunks = self.chunker.chunk(text, &metadata);
        info!(doc_id = %doc_id, doc_name, chunk_count = chunks.len(), "processed document");
        chunks
    }

    /// Chunk several documents, preserving document order and per-document chunk order.
    pub fn process_multiple_documents(&self, documents: &[DocumentInput]) -> Vec<Chunk> {
        let all_chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| {
                self.process_document(&doc.text, None, doc.name.as_deref(), doc.doc_type.as_deref())
            })
            .collect();

        info!(
            document_count = documents.len(),
            chunk_count = all_chunks.len(),
            "processed documents"
        );
        all_chunks
    }

    /// Read a UTF-8 text file and chunk it as a `text_file` named after the file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`](crate::RagError::Io) if the file cannot be read.
    pub async fn process_text_file(&self, path: impl AsRef<Path>) -> Result<Vec<Chunk>> {
        let path = path.as_ref();
        let text = load_text_file(path).await?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Ok(self.process_document(&text, None, name.as_deref(), Some("text_file")))
    }
}

/// Load a UTF-8 text file.
pub async fn load_text_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    tokio::fs::read_to_string(path).await.map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "failed to load text file");
        e.into()
    })
}
