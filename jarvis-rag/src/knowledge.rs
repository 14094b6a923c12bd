//! Knowledge store: embeds chunks, stores them in a similarity index, and
//! searches them.
//!
//! Ingestion is at-least-once rather than atomic: vectors are upserted in
//! batches and a failed batch leaves earlier batches in place.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::config::RagConfig;
use crate::document::{Chunk, SearchResult, VectorRecord};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexStats, VectorStore};

/// Owns the chunk-to-vector lifecycle for a single index.
///
/// # Example
///
/// ```rust,ignore
/// let knowledge = KnowledgeStore::open(embedder, Arc::new(InMemoryVectorStore::new()),
///     "jarvis-knowledge-base", &RagConfig::default()).await?;
/// knowledge.add(&chunks).await?;
/// let hits = knowledge.search("remote work", None).await;
/// ```
pub struct KnowledgeStore {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    index_name: String,
    dimensions: usize,
    batch_size: usize,
    default_top_k: usize,
}

impl std::fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeStore")
            .field("index_name", &self.index_name)
            .field("dimensions", &self.dimensions)
            .field("backend", &self.store.backend_name())
            .finish_non_exhaustive()
    }
}

impl KnowledgeStore {
    /// Create or reuse the named index with the embedder's dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the index already exists
    /// with a different dimensionality, [`RagError::ConfigError`] if the
    /// embedder reports zero dimensions, or the backend error if the index
    /// cannot be reached. Callers should treat all of these as fatal.
    pub async fn open(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        index_name: impl Into<String>,
        config: &RagConfig,
    ) -> Result<Self> {
        let index_name = index_name.into();
        let dimensions = embedder.dimensions();
        if dimensions == 0 {
            return Err(RagError::ConfigError(format!(
                "embedding provider '{}' reported zero dimensions",
                embedder.name()
            )));
        }

        store.ensure_index(&index_name, dimensions).await.map_err(|e| {
            error!(index = %index_name, dimensions, error = %e, "failed to initialize index");
            e
        })?;
        info!(index = %index_name, dimensions, backend = store.backend_name(), "connected to index");

        Ok(Self {
            embedder,
            store,
            index_name,
            dimensions,
            batch_size: config.upsert_batch_size.max(1),
            default_top_k: config.top_k,
        })
    }

    /// The index this store reads and writes.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// The fixed embedding dimensionality.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed and store chunks, returning how many were stored.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] naming the failed batch. Batches
    /// stored before the failure are kept.
    pub async fn add(&self, chunks: &[Chunk]) -> Result<usize> {
        let mut stored = 0;
        for (batch_number, batch) in chunks.chunks(self.batch_size).enumerate() {
            if let Err(e) = self.add_batch(batch).await {
                error!(
                    index = %self.index_name,
                    batch = batch_number,
                    stored,
                    error = %e,
                    "failed to add chunks"
                );
                return Err(RagError::PipelineError(format!(
                    "batch {batch_number} failed after {stored} chunks were stored: {e}"
                )));
            }
            stored += batch.len();
        }

        info!(index = %self.index_name, chunk_count = stored, "added chunks to knowledge store");
        Ok(stored)
    }

    async fn add_batch(&self, batch: &[Chunk]) -> Result<()> {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != batch.len() {
            return Err(RagError::EmbeddingError {
                provider: self.embedder.name().to_string(),
                message: format!("expected {} embeddings, got {}", batch.len(), embeddings.len()),
            });
        }

        let records = batch
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| {
                if values.len() != self.dimensions {
                    return Err(RagError::DimensionMismatch {
                        expected: self.dimensions,
                        actual: values.len(),
                    });
                }
                Ok(VectorRecord::from_chunk(chunk, values))
            })
            .collect::<Result<Vec<_>>>()?;

        self.store.upsert(&self.index_name, &records).await
    }

    /// Search for the chunks most similar to `query`.
    ///
    /// Results are ordered by descending similarity. `top_k` defaults to the
    /// configured value.
    ///
    /// # Errors
    ///
    /// Returns the embedding or backend error unchanged.
    pub async fn try_search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchResult>> {
        let top_k = top_k.unwrap_or(self.default_top_k);
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query).await?;
        let matches = self.store.query(&self.index_name, &embedding, top_k).await?;
        Ok(matches.into_iter().map(SearchResult::from).collect())
    }

    /// Like [`try_search`](Self::try_search), but any failure degrades to
    /// an empty result and is logged.
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Vec<SearchResult> {
        self.try_search(query, top_k).await.unwrap_or_else(|e| {
            error!(index = %self.index_name, error = %e, "error searching documents");
            Vec::new()
        })
    }

    /// Irreversibly remove every stored vector.
    pub async fn delete_all(&self) -> Result<()> {
        self.store.delete_all(&self.index_name).await.map_err(|e| {
            error!(index = %self.index_name, error = %e, "error deleting documents");
            e
        })?;
        warn!(index = %self.index_name, "deleted all documents from knowledge store");
        Ok(())
    }

    /// Point-in-time index statistics.
    pub async fn try_stats(&self) -> Result<IndexStats> {
        self.store.describe_stats(&self.index_name).await
    }

    /// Index statistics as a JSON map; empty if the backend cannot be reached.
    pub async fn stats(&self) -> Map<String, Value> {
        match self.try_stats().await.map(serde_json::to_value) {
            Ok(Ok(Value::Object(map))) => map,
            Ok(_) => Map::new(),
            Err(e) => {
                error!(index = %self.index_name, error = %e, "error getting stats");
                Map::new()
            }
        }
    }
}
