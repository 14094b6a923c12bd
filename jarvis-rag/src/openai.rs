//! OpenAI-compatible embedding provider.
//!
//! Works against the OpenAI embeddings API and against any server exposing
//! the same `/v1/embeddings` shape (text-embeddings-inference, vLLM,
//! LocalAI, ...). This module is only available when the `openai` feature is
//! enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::embedding::{DIMENSION_PROBE, EmbeddingProvider};
use crate::error::{RagError, Result};

/// The default OpenAI API base address.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// The default model for OpenAI embeddings.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

const PROVIDER: &str = "openai";

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible embeddings endpoint.
///
/// # Configuration
///
/// - `base_url` – defaults to `https://api.openai.com`.
/// - `model` – defaults to `text-embedding-3-small`.
/// - `api_key` – optional; self-hosted servers usually need none.
///
/// # Example
///
/// ```rust,ignore
/// use jarvis_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("http://localhost:8080", "all-MiniLM-L6-v2")
///     .discover_dimensions()
///     .await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    timeout: Duration,
}

impl std::fmt::Debug for OpenAIEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIEmbeddingProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl OpenAIEmbeddingProvider {
    /// Create a provider for the given server and model.
    ///
    /// The dimensionality is unknown until
    /// [`discover_dimensions`](Self::discover_dimensions) or
    /// [`with_dimensions`](Self::with_dimensions) is called.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            dimensions: 0,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the bearer token sent with each request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.is_empty()).then_some(api_key);
        self
    }

    /// Set a known dimensionality, skipping discovery.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Embed a probe string and record the resulting dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if the probe fails or yields an
    /// empty vector.
    pub async fn discover_dimensions(mut self) -> Result<Self> {
        let probe = self.embed_batch(&[DIMENSION_PROBE]).await?;
        let dimensions = probe.first().map(Vec::len).unwrap_or_default();
        if dimensions == 0 {
            return Err(Self::embedding_error("probe embedding was empty".into()));
        }
        self.dimensions = dimensions;
        info!(provider = PROVIDER, model = %self.model, dimensions, "embedding backend ready");
        Ok(self)
    }

    fn embedding_error(message: String) -> RagError {
        RagError::EmbeddingError { provider: PROVIDER.into(), message }
    }
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| Self::embedding_error("API returned empty response".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let mut request = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&EmbeddingRequest { model: &self.model, input: texts.to_vec() });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "request failed");
            Self::embedding_error(format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = PROVIDER, %status, "API error");
            return Err(Self::embedding_error(format!("API returned {status}: {detail}")));
        }

        let mut embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            Self::embedding_error(format!("failed to parse response: {e}"))
        })?;

        embedding_response.data.sort_by_key(|d| d.index);
        Ok(embedding_response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
