//! Generation backend trait.

use async_trait::async_trait;

use crate::error::Result;

/// A language-model backend that completes a fully assembled prompt.
///
/// Implementations make a single, non-streaming attempt per call and must
/// bound every request with a timeout. Non-success responses are returned as
/// [`RagError::GenerationError`](crate::RagError::GenerationError) so the
/// caller can degrade gracefully.
#[async_trait]
pub trait Generator: Send + Sync {
    /// The model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Complete `prompt` and return the generated text.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Report whether the backend is reachable.
    async fn check_connection(&self) -> bool;

    /// List the models the backend can serve.
    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec![self.model().to_string()])
    }
}
