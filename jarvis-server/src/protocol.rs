//! JSON request and response bodies for the HTTP API.

use jarvis_rag::{DocumentInput, HealthReport, QueryResult, SearchResult};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default = "default_true")]
    pub use_context: bool,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Body of `POST /query`. Backend failures stay in the server log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
    pub context: Vec<SearchResult>,
    pub used_context: bool,
}

impl From<QueryResult> for QueryResponse {
    fn from(result: QueryResult) -> Self {
        Self {
            question: result.question,
            answer: result.answer,
            context: result.context,
            used_context: result.used_context,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddKnowledgeRequest {
    pub text: String,
    #[serde(default)]
    pub doc_name: Option<String>,
    #[serde(default)]
    pub doc_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDocumentsRequest {
    pub documents: Vec<DocumentInput>,
}

/// Body of every successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self { status: "success".to_string(), message: message.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`.
    pub status: String,
    pub components: HealthReport,
}

impl From<HealthReport> for HealthResponse {
    fn from(report: HealthReport) -> Self {
        let status = if report.overall { "healthy" } else { "unhealthy" };
        Self { status: status.to_string(), components: report }
    }
}

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
