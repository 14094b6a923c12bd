//! # jarvis-rag
//!
//! Retrieval-augmented question answering for the Jarvis assistant.
//!
//! ## Overview
//!
//! Documents are split into overlapping chunks, embedded, and stored in a
//! similarity index. Questions are answered by retrieving the most similar
//! chunks, assembling a prompt with recent conversation history, and asking
//! a text-generation backend.
//!
//! - [`SentenceChunker`] / [`DocumentProcessor`] - sentence-aware chunking
//! - [`KnowledgeStore`] - embed, store, and search chunks
//! - [`RagEngine`] - the query orchestrator
//! - [`InMemoryVectorStore`] - brute-force cosine index for tests and small corpora
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use jarvis_rag::ollama::{OllamaConfig, OllamaEmbeddingProvider, OllamaGenerator};
//! use jarvis_rag::{InMemoryVectorStore, KnowledgeStore, RagConfig, RagEngine};
//!
//! let config = RagConfig::from_env()?;
//! let embedder = OllamaEmbeddingProvider::connect(OllamaConfig::new(
//!     "http://localhost:11434",
//!     "all-minilm",
//! ))
//! .await?;
//! let knowledge = KnowledgeStore::open(
//!     Arc::new(embedder),
//!     Arc::new(InMemoryVectorStore::new()),
//!     "jarvis-knowledge-base",
//!     &config,
//! )
//! .await?;
//! let engine = RagEngine::builder()
//!     .config(config)
//!     .knowledge(knowledge)
//!     .generator(Arc::new(OllamaGenerator::new(OllamaConfig::default())))
//!     .build()?;
//!
//! let result = engine.answer("What is the remote work policy?", true, None).await;
//! println!("{}", result.answer);
//! ```
//!
//! ## Features
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `ollama` (default) | Ollama generation and embeddings |
//! | `openai` | OpenAI-compatible embeddings |
//! | `qdrant` | Qdrant similarity index |

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod knowledge;
pub mod prompt;
pub mod session;
pub mod vectorstore;

#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{Chunker, DocumentProcessor, SentenceChunker, load_text_file};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, DocumentInput, Metadata, ScoredRecord, SearchResult, VectorRecord};
pub use embedding::EmbeddingProvider;
pub use engine::{
    APOLOGY_ANSWER, EngineStats, HealthReport, QueryResult, RagEngine, RagEngineBuilder,
};
pub use error::{RagError, Result};
pub use generation::Generator;
pub use inmemory::InMemoryVectorStore;
pub use knowledge::KnowledgeStore;
pub use prompt::{DEFAULT_SYSTEM_PROMPT, PromptAssembler};
pub use session::{ConversationSession, Message, Role};
pub use vectorstore::{IndexStats, VectorStore};
