//! Wires a [`RagEngine`] from [`Settings`].
//!
//! Every failure here is fatal: an unreachable embedding backend or an index
//! provisioned with a different dimensionality stops the process before it
//! starts serving.

use std::sync::Arc;

use anyhow::Context;
use jarvis_rag::ollama::{OllamaConfig, OllamaEmbeddingProvider, OllamaGenerator};
use jarvis_rag::openai::OpenAIEmbeddingProvider;
use jarvis_rag::{EmbeddingProvider, InMemoryVectorStore, KnowledgeStore, RagEngine, VectorStore};
use tracing::info;

use crate::settings::{EmbeddingBackend, Settings, VectorBackend};

/// Connect to every backend and assemble the engine.
pub async fn build_engine(settings: &Settings) -> anyhow::Result<RagEngine> {
    let embedder = connect_embedder(settings).await?;
    let store = open_vector_store(settings)?;

    let knowledge = KnowledgeStore::open(embedder, store, &settings.index_name, &settings.rag)
        .await
        .with_context(|| format!("failed to open index '{}'", settings.index_name))?;

    let generator = OllamaGenerator::new(
        OllamaConfig::new(&settings.ollama_base_url, &settings.ollama_model)
            .with_request_timeout(settings.generation_timeout)
            .with_health_timeout(settings.health_timeout),
    );

    let engine = RagEngine::builder()
        .config(settings.rag.clone())
        .knowledge(knowledge)
        .generator(Arc::new(generator))
        .build()
        .context("failed to build rag engine")?;
    Ok(engine)
}

async fn connect_embedder(settings: &Settings) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    info!(
        backend = %settings.embedding_backend,
        model = %settings.embedding_model,
        url = %settings.embedding_base_url,
        "connecting to embedding backend"
    );

    let embedder: Arc<dyn EmbeddingProvider> = match settings.embedding_backend {
        EmbeddingBackend::Ollama => {
            let config = OllamaConfig::new(&settings.embedding_base_url, &settings.embedding_model)
                .with_request_timeout(settings.embedding_timeout)
                .with_health_timeout(settings.health_timeout);
            Arc::new(
                OllamaEmbeddingProvider::connect(config)
                    .await
                    .context("failed to reach the ollama embedding backend")?,
            )
        }
        EmbeddingBackend::OpenAI => {
            let mut provider =
                OpenAIEmbeddingProvider::new(&settings.embedding_base_url, &settings.embedding_model)
                    .with_timeout(settings.embedding_timeout);
            if let Some(api_key) = &settings.openai_api_key {
                provider = provider.with_api_key(api_key);
            }
            Arc::new(
                provider
                    .discover_dimensions()
                    .await
                    .context("failed to reach the openai-compatible embedding backend")?,
            )
        }
    };
    Ok(embedder)
}

fn open_vector_store(settings: &Settings) -> anyhow::Result<Arc<dyn VectorStore>> {
    match settings.vector_backend {
        VectorBackend::Memory => Ok(Arc::new(InMemoryVectorStore::new())),
        VectorBackend::Qdrant => open_qdrant(&settings.qdrant_url),
    }
}

#[cfg(feature = "qdrant")]
fn open_qdrant(url: &str) -> anyhow::Result<Arc<dyn VectorStore>> {
    let store = jarvis_rag::qdrant::QdrantVectorStore::new(url)
        .with_context(|| format!("invalid qdrant url '{url}'"))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "qdrant"))]
fn open_qdrant(_url: &str) -> anyhow::Result<Arc<dyn VectorStore>> {
    anyhow::bail!("VECTOR_BACKEND=qdrant requires building with the `qdrant` feature")
}
