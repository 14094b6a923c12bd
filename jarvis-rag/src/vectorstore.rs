//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{ScoredRecord, VectorRecord};
use crate::error::Result;

/// Point-in-time statistics for one index.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexStats {
    /// Dimensionality the index was provisioned with.
    pub dimension: usize,
    /// Number of vectors currently stored.
    pub total_vector_count: u64,
    /// Fraction of capacity in use, for backends that report one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_fullness: Option<f32>,
}

/// A similarity index backend.
///
/// Indexes are named and use cosine similarity. Every vector stored in an
/// index must have the index's dimensionality.
///
/// # Example
///
/// ```rust,ignore
/// use jarvis_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.ensure_index("docs", 384).await?;
/// store.upsert("docs", &records).await?;
/// let hits = store.query("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the index if absent, or reuse it if present.
    ///
    /// Returns [`RagError::DimensionMismatch`](crate::RagError::DimensionMismatch)
    /// if an existing index was provisioned with a different dimensionality.
    async fn ensure_index(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Insert or replace records by id.
    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()>;

    /// Return up to `top_k` records nearest to `embedding`, ordered by
    /// descending similarity score.
    async fn query(&self, index: &str, embedding: &[f32], top_k: usize)
    -> Result<Vec<ScoredRecord>>;

    /// Remove every record from the index. The index itself stays usable.
    async fn delete_all(&self, index: &str) -> Result<()>;

    /// Report statistics for the index.
    async fn describe_stats(&self, index: &str) -> Result<IndexStats>;

    /// Short backend name used in logs and errors.
    fn backend_name(&self) -> &str;
}
