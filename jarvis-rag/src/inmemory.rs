//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a zero-dependency vector store
//! backed by a `HashMap` protected by a `tokio::sync::RwLock`. It is suitable
//! for development, testing, and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{ScoredRecord, VectorRecord};
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexStats, VectorStore};

const BACKEND: &str = "in-memory";

#[derive(Debug, Default)]
struct MemoryIndex {
    dimensions: usize,
    records: HashMap<String, VectorRecord>,
}

/// An in-memory vector store using cosine similarity for search.
///
/// Indexes are stored as nested `HashMap`s: index name → record id → record.
/// All operations are async-safe via `tokio::sync::RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing_index(name: &str) -> RagError {
    RagError::VectorStoreError {
        backend: BACKEND.to_string(),
        message: format!("index '{name}' does not exist"),
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_index(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        match indexes.get(name) {
            Some(existing) if existing.dimensions != dimensions => {
                Err(RagError::DimensionMismatch { expected: existing.dimensions, actual: dimensions })
            }
            Some(_) => {
                debug!(index = name, "reusing in-memory index");
                Ok(())
            }
            None => {
                indexes.insert(
                    name.to_string(),
                    MemoryIndex { dimensions, records: HashMap::new() },
                );
                debug!(index = name, dimensions, "created in-memory index");
                Ok(())
            }
        }
    }

    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        let store = indexes.get_mut(index).ok_or_else(|| missing_index(index))?;
        if let Some(bad) = records.iter().find(|r| r.values.len() != store.dimensions) {
            return Err(RagError::DimensionMismatch {
                expected: store.dimensions,
                actual: bad.values.len(),
            });
        }
        for record in records {
            store.records.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let indexes = self.indexes.read().await;
        let store = indexes.get(index).ok_or_else(|| missing_index(index))?;

        let mut scored: Vec<ScoredRecord> = store
            .records
            .values()
            .map(|record| ScoredRecord {
                id: record.id.clone(),
                score: cosine_similarity(&record.values, embedding),
                metadata: record.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_all(&self, index: &str) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        let store = indexes.get_mut(index).ok_or_else(|| missing_index(index))?;
        store.records.clear();
        Ok(())
    }

    async fn describe_stats(&self, index: &str) -> Result<IndexStats> {
        let indexes = self.indexes.read().await;
        let store = indexes.get(index).ok_or_else(|| missing_index(index))?;
        Ok(IndexStats {
            dimension: store.dimensions,
            total_vector_count: store.records.len() as u64,
            index_fullness: None,
        })
    }

    fn backend_name(&self) -> &str {
        BACKEND
    }
}
