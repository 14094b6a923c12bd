//! Error types for the `jarvis-rag` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation backend failed or returned a non-success status.
    #[error("Generation error ({backend}): {message}")]
    GenerationError {
        /// The generation backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An embedding's length does not match the index dimensionality.
    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality the index was provisioned with.
        expected: usize,
        /// Dimensionality that was actually supplied.
        actual: usize,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the query or ingestion pipeline.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Reading a source document failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
