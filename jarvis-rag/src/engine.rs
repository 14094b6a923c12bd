//! Query orchestrator.
//!
//! The [`RagEngine`] coordinates knowledge ingestion (chunk → embed → store)
//! and question answering (search → prompt → generate → record turn) by
//! composing a [`KnowledgeStore`], a [`Generator`], a [`Chunker`], and a
//! [`PromptAssembler`].
//!
//! # Example
//!
//! ```rust,ignore
//! use jarvis_rag::{KnowledgeStore, RagConfig, RagEngine};
//!
//! let engine = RagEngine::builder()
//!     .config(config)
//!     .knowledge(knowledge)
//!     .generator(Arc::new(OllamaGenerator::new(OllamaConfig::default())))
//!     .build()?;
//!
//! engine.add_knowledge("Remote work allowed.", Some("Policy"), None).await?;
//! let result = engine.answer("Can I work remotely?", true, None).await;
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::chunking::{Chunker, DocumentProcessor, SentenceChunker};
use crate::config::RagConfig;
use crate::document::{DocumentInput, SearchResult};
use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::knowledge::KnowledgeStore;
use crate::prompt::PromptAssembler;
use crate::session::{ConversationSession, Message};

/// Answer returned when retrieval or generation fails.
pub const APOLOGY_ANSWER: &str = "I encountered an error processing your question.";

/// The outcome of one [`RagEngine::answer`] call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    /// The question as asked.
    pub question: String,
    /// The generated answer, or [`APOLOGY_ANSWER`] on failure.
    pub answer: String,
    /// Retrieved chunks in descending score order.
    pub context: Vec<SearchResult>,
    /// True iff retrieval was requested and returned at least one chunk.
    pub used_context: bool,
    /// Why the query failed, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why retrieval degraded to no context, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_error: Option<String>,
}

impl QueryResult {
    /// A well-formed result for a query that could not be answered.
    pub fn failed(question: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: APOLOGY_ANSWER.to_string(),
            context: Vec::new(),
            used_context: false,
            error: Some(error.into()),
            retrieval_error: None,
        }
    }

    /// Whether the query produced a generated answer.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Reachability of each backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthReport {
    /// The generation backend answered its health probe.
    pub llm: bool,
    /// The similarity index answered a stats request.
    pub vector_store: bool,
    /// Both of the above.
    pub overall: bool,
}

/// Engine-wide statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineStats {
    /// Index statistics; empty if the index could not be reached.
    pub vector_store: Map<String, Value>,
    /// Number of retained conversation entries.
    pub conversation_length: usize,
}

/// The retrieval-augmented question-answering engine.
///
/// Construct one per process via [`RagEngine::builder()`] and share it
/// behind an `Arc`.
pub struct RagEngine {
    config: RagConfig,
    knowledge: KnowledgeStore,
    generator: Arc<dyn Generator>,
    processor: DocumentProcessor,
    assembler: PromptAssembler,
    session: RwLock<ConversationSession>,
}

impl std::fmt::Debug for RagEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagEngine")
            .field("config", &self.config)
            .field("knowledge", &self.knowledge)
            .field("model", &self.generator.model())
            .finish_non_exhaustive()
    }
}

impl RagEngine {
    /// Create a new [`RagEngineBuilder`].
    pub fn builder() -> RagEngineBuilder {
        RagEngineBuilder::default()
    }

    /// Return a reference to the engine configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the knowledge store.
    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    /// Return a reference to the generation backend.
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Answer a question, optionally grounding it in retrieved context.
    ///
    /// Never fails: a retrieval error degrades to answering without context
    /// (recorded in [`QueryResult::retrieval_error`]); a generation error
    /// yields [`APOLOGY_ANSWER`] with [`QueryResult::error`] set and leaves
    /// the conversation untouched.
    pub async fn answer(&self, question: &str, use_context: bool, top_k: Option<usize>) -> QueryResult {
        let mut context = Vec::new();
        let mut retrieval_error = None;

        if use_context {
            match self.knowledge.try_search(question, top_k).await {
                Ok(hits) => {
                    info!(result_count = hits.len(), "retrieved context documents");
                    context = hits;
                }
                Err(e) => {
                    warn!(error = %e, "retrieval failed, answering without context");
                    retrieval_error = Some(e.to_string());
                }
            }
        }

        let texts: Vec<String> = context.iter().map(|hit| hit.text.clone()).collect();
        let history = self.history().await;
        let prompt = self.assembler.build(question, Some(&texts), &history);

        let answer = match self.generator.generate(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(error = %e, model = self.generator.model(), "error generating response");
                return QueryResult::failed(question, e.to_string());
            }
        };

        self.session.write().await.record_turn(question, answer.clone());

        let used_context = use_context && !context.is_empty();
        QueryResult {
            question: question.to_string(),
            answer,
            context,
            used_context,
            error: None,
            retrieval_error,
        }
    }

    /// Chunk and store one document, returning the number of chunks stored.
    ///
    /// Empty or whitespace-only text stores nothing and returns `Ok(0)`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if embedding or storage fails.
    pub async fn add_knowledge(
        &self,
        text: &str,
        doc_name: Option<&str>,
        doc_type: Option<&str>,
    ) -> Result<usize> {
        let chunks = self.processor.process_document(text, None, doc_name, doc_type);
        if chunks.is_empty() {
            warn!(doc_name, "no chunks created from document");
            return Ok(0);
        }

        let stored = self.knowledge.add(&chunks).await?;
        info!(doc_name, chunk_count = stored, "added knowledge");
        Ok(stored)
    }

    /// Chunk and store several documents, returning the number of chunks stored.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if embedding or storage fails.
    pub async fn add_documents(&self, documents: &[DocumentInput]) -> Result<usize> {
        let chunks = self.processor.process_multiple_documents(documents);
        if chunks.is_empty() {
            warn!(document_count = documents.len(), "no chunks created from documents");
            return Ok(0);
        }
        self.knowledge.add(&chunks).await
    }

    /// Read a UTF-8 text file and store it as a `text_file` document.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the file cannot be read, or the ingestion
    /// error from [`add_knowledge`](Self::add_knowledge).
    pub async fn add_knowledge_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let chunks = self.processor.process_text_file(path).await?;
        if chunks.is_empty() {
            warn!(path = %path.display(), "no chunks created from file");
            return Ok(0);
        }

        let stored = self.knowledge.add(&chunks).await?;
        info!(path = %path.display(), chunk_count = stored, "added knowledge from file");
        Ok(stored)
    }

    /// Remove every stored chunk.
    pub async fn clear_knowledge(&self) -> Result<()> {
        self.knowledge.delete_all().await
    }

    /// Forget the conversation so far.
    pub async fn clear_conversation(&self) {
        self.session.write().await.clear();
        info!("cleared conversation history");
    }

    /// A snapshot of the conversation, oldest entry first.
    pub async fn history(&self) -> Vec<Message> {
        self.session.read().await.history()
    }

    /// Index statistics plus conversation length.
    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            vector_store: self.knowledge.stats().await,
            conversation_length: self.session.read().await.len(),
        }
    }

    /// Probe every backend.
    pub async fn check_health(&self) -> HealthReport {
        let (llm, index) =
            tokio::join!(self.generator.check_connection(), self.knowledge.try_stats());
        let vector_store = index.is_ok();
        HealthReport { llm, vector_store, overall: llm && vector_store }
    }
}

/// Builder for constructing a [`RagEngine`].
///
/// `config`, `knowledge`, and `generator` are required. The chunker
/// defaults to a [`SentenceChunker`] sized from the config and the prompt
/// assembler to the default instruction with the configured history window.
#[derive(Default)]
pub struct RagEngineBuilder {
    config: Option<RagConfig>,
    knowledge: Option<KnowledgeStore>,
    generator: Option<Arc<dyn Generator>>,
    chunker: Option<Arc<dyn Chunker>>,
    assembler: Option<PromptAssembler>,
}

impl RagEngineBuilder {
    /// Set the engine configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the knowledge store.
    pub fn knowledge(mut self, knowledge: KnowledgeStore) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    /// Set the generation backend.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Override the default chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Override the default prompt assembler.
    pub fn assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = Some(assembler);
        self
    }

    /// Build the [`RagEngine`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing.
    pub fn build(self) -> Result<RagEngine> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        let knowledge = self
            .knowledge
            .ok_or_else(|| RagError::ConfigError("knowledge store is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;

        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(SentenceChunker::new(config.chunk_size, config.chunk_overlap))
        });
        let assembler = self
            .assembler
            .unwrap_or_else(|| PromptAssembler::new().with_history_window(config.history_window));
        let session = ConversationSession::new(config.max_history_entries);

        info!(model = generator.model(), index = knowledge.index_name(), "rag engine initialized");

        Ok(RagEngine {
            config,
            knowledge,
            generator,
            processor: DocumentProcessor::new(chunker),
            assembler,
            session: RwLock::new(session),
        })
    }
}
