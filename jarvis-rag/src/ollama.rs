//! Ollama generation and embedding backends.
//!
//! This module is only available when the `ollama` feature is enabled.
//!
//! - [`OllamaGenerator`] calls `POST /api/generate` with streaming disabled
//!   and uses `GET /api/tags` for health checks and model listing.
//! - [`OllamaEmbeddingProvider`] calls `POST /api/embed` and discovers its
//!   dimensionality once, at construction.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::embedding::{DIMENSION_PROBE, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::Generator;

/// The default Ollama server address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// The default generation model.
pub const DEFAULT_MODEL: &str = "llama2";

/// The default embedding model (MiniLM-L6-v2, 384 dimensions).
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

const PROVIDER: &str = "ollama";

/// Connection settings shared by the Ollama backends.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Server address, e.g. `http://localhost:11434`.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Timeout for generation and embedding requests.
    pub request_timeout: Duration,
    /// Timeout for health checks and model listing.
    pub health_timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(60),
            health_timeout: Duration::from_secs(5),
        }
    }
}

impl OllamaConfig {
    /// Create a config for the given server and model with default timeouts.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), model: model.into(), ..Default::default() }
    }

    /// Set the generation/embedding request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the health-check timeout.
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Turn a non-success response into a readable message.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
    format!("API returned {status}: {detail}")
}

// ── Generator implementation ───────────────────────────────────────

/// A [`Generator`] backed by a local or remote Ollama server.
///
/// # Example
///
/// ```rust,ignore
/// use jarvis_rag::ollama::{OllamaConfig, OllamaGenerator};
///
/// let generator = OllamaGenerator::new(OllamaConfig::new("http://localhost:11434", "llama2"));
/// let answer = generator.generate("User: hi\nAssistant:").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaGenerator {
    /// Create a generator. No request is made until first use.
    pub fn new(config: OllamaConfig) -> Self {
        Self { client: reqwest::Client::new(), config }
    }

    fn generation_error(message: String) -> RagError {
        RagError::GenerationError { backend: PROVIDER.into(), message }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.config.model, prompt_len = prompt.len(), "generating");

        let response = self
            .client
            .post(self.config.url("/api/generate"))
            .timeout(self.config.request_timeout)
            .json(&GenerateRequest { model: &self.config.model, prompt, stream: false })
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "generate request failed");
                Self::generation_error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let detail = error_detail(response).await;
            error!(provider = PROVIDER, %detail, "LLM API error");
            return Err(Self::generation_error(detail));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse generate response");
            Self::generation_error(format!("failed to parse response: {e}"))
        })?;

        Ok(body.response)
    }

    async fn check_connection(&self) -> bool {
        match self
            .client
            .get(self.config.url("/api/tags"))
            .timeout(self.config.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                error!(provider = PROVIDER, error = %e, "cannot connect to ollama");
                false
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.config.url("/api/tags"))
            .timeout(self.config.health_timeout)
            .send()
            .await
            .map_err(|e| Self::generation_error(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::generation_error(error_detail(response).await));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Self::generation_error(format!("failed to parse response: {e}")))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

// ── EmbeddingProvider implementation ───────────────────────────────

/// An [`EmbeddingProvider`] backed by Ollama's `/api/embed` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    config: OllamaConfig,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    /// Connect to the server and discover the model's dimensionality by
    /// embedding a probe string.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if the probe fails or yields an
    /// empty vector.
    pub async fn connect(config: OllamaConfig) -> Result<Self> {
        let mut provider = Self::with_dimensions(config, 0);
        let probe = provider.embed_batch(&[DIMENSION_PROBE]).await?;
        let dimensions = probe.first().map(Vec::len).unwrap_or_default();
        if dimensions == 0 {
            return Err(Self::embedding_error("probe embedding was empty".into()));
        }
        provider.dimensions = dimensions;
        info!(provider = PROVIDER, model = %provider.config.model, dimensions, "embedding backend ready");
        Ok(provider)
    }

    /// Create a provider with a known dimensionality, skipping discovery.
    pub fn with_dimensions(config: OllamaConfig, dimensions: usize) -> Self {
        Self { client: reqwest::Client::new(), config, dimensions }
    }

    fn embedding_error(message: String) -> RagError {
        RagError::EmbeddingError { provider: PROVIDER.into(), message }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
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

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.config.model, "embedding batch");

        let response = self
            .client
            .post(self.config.url("/api/embed"))
            .timeout(self.config.request_timeout)
            .json(&EmbedRequest { model: &self.config.model, input: texts.to_vec() })
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "embed request failed");
                Self::embedding_error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let detail = error_detail(response).await;
            error!(provider = PROVIDER, %detail, "embedding API error");
            return Err(Self::embedding_error(detail));
        }

        let body: EmbedResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse embed response");
            Self::embedding_error(format!("failed to parse response: {e}"))
        })?;

        if body.embeddings.len() != texts.len() {
            return Err(Self::embedding_error(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }

        Ok(body.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
