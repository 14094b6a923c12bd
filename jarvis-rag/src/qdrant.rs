//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//! Each index maps to a Qdrant collection with cosine distance; record
//! metadata is stored as the point payload.
//!
//! # Example
//!
//! ```rust,ignore
//! use jarvis_rag::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334")?;
//! store.ensure_index("jarvis-knowledge-base", 384).await?;
//! ```

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CollectionInfo, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::Value;
use tracing::{debug, info};

use crate::document::{Metadata, ScoredRecord, VectorRecord};
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexStats, VectorStore};

const BACKEND: &str = "qdrant";

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Create a new Qdrant vector store connecting to the given URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        Ok(Self { client })
    }

    /// Create a new Qdrant vector store with default URL (`http://localhost:6334`).
    pub fn default_url() -> Result<Self> {
        Self::new("http://localhost:6334")
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::VectorStoreError { backend: BACKEND.to_string(), message: e.to_string() }
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let response = self.client.collection_info(name).await.map_err(Self::map_err)?;
        response.result.ok_or_else(|| RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("no collection info returned for '{name}'"),
        })
    }

    /// Read the single-vector dimensionality a collection was created with.
    fn dimensions_of(info: &CollectionInfo) -> Option<usize> {
        let vectors = info.config.as_ref()?.params.as_ref()?.vectors_config.as_ref()?;
        match vectors.config.as_ref()? {
            VectorsConfigKind::Params(params) => Some(params.size as usize),
            VectorsConfigKind::ParamsMap(_) => None,
        }
    }

    async fn create(&self, name: &str, dimensions: usize) -> Result<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(Self::map_err)?;
        info!(index = name, dimensions, "created qdrant collection");
        Ok(())
    }

    fn to_payload(metadata: &Metadata) -> Result<Payload> {
        Payload::try_from(Value::Object(metadata.clone())).map_err(Self::map_err)
    }

    fn to_json(value: &QdrantValue) -> Value {
        match &value.kind {
            None | Some(Kind::NullValue(_)) => Value::Null,
            Some(Kind::BoolValue(b)) => Value::Bool(*b),
            Some(Kind::IntegerValue(i)) => Value::from(*i),
            Some(Kind::DoubleValue(d)) => Value::from(*d),
            Some(Kind::StringValue(s)) => Value::String(s.clone()),
            Some(Kind::ListValue(list)) => {
                Value::Array(list.values.iter().map(Self::to_json).collect())
            }
            Some(Kind::StructValue(s)) => Value::Object(
                s.fields.iter().map(|(k, v)| (k.clone(), Self::to_json(v))).collect(),
            ),
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_index(&self, name: &str, dimensions: usize) -> Result<()> {
        let exists = self.client.collection_exists(name).await.map_err(Self::map_err)?;
        if !exists {
            return self.create(name, dimensions).await;
        }

        let info = self.collection_info(name).await?;
        match Self::dimensions_of(&info) {
            Some(existing) if existing != dimensions => {
                Err(RagError::DimensionMismatch { expected: existing, actual: dimensions })
            }
            Some(_) => {
                debug!(index = name, "qdrant collection already exists, reusing");
                Ok(())
            }
            None => Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!("collection '{name}' does not use a single unnamed vector"),
            }),
        }
    }

    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let points = records
            .iter()
            .map(|record| {
                Ok(PointStruct::new(
                    record.id.clone(),
                    record.values.clone(),
                    Self::to_payload(&record.metadata)?,
                ))
            })
            .collect::<Result<Vec<PointStruct>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(index, points).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(index, count = records.len(), "upserted points to qdrant");
        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(index, embedding.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(Self::map_err)?;

        let results = response
            .result
            .into_iter()
            .map(|scored| {
                let id = scored
                    .id
                    .as_ref()
                    .and_then(|pid| match &pid.point_id_options {
                        Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
                        Some(PointIdOptions::Num(n)) => Some(n.to_string()),
                        None => None,
                    })
                    .unwrap_or_default();

                let metadata: Metadata =
                    scored.payload.iter().map(|(k, v)| (k.clone(), Self::to_json(v))).collect();

                ScoredRecord { id, score: scored.score, metadata }
            })
            .collect();

        Ok(results)
    }

    async fn delete_all(&self, index: &str) -> Result<()> {
        let info = self.collection_info(index).await?;
        let dimensions = Self::dimensions_of(&info).ok_or_else(|| RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("cannot determine dimensions of collection '{index}'"),
        })?;

        self.client.delete_collection(index).await.map_err(Self::map_err)?;
        self.create(index, dimensions).await?;
        info!(index, "cleared qdrant collection");
        Ok(())
    }

    async fn describe_stats(&self, index: &str) -> Result<IndexStats> {
        let info = self.collection_info(index).await?;
        Ok(IndexStats {
            dimension: Self::dimensions_of(&info).unwrap_or_default(),
            total_vector_count: info.points_count.unwrap_or_default(),
            index_fullness: None,
        })
    }

    fn backend_name(&self) -> &str {
        BACKEND
    }
}
