//! HTTP contract tests for the OpenAI-compatible embedding provider.
#![cfg(feature = "openai")]

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use jarvis_rag::openai::OpenAIEmbeddingProvider;
use jarvis_rag::{EmbeddingProvider, RagError};
use serde_json::{Value, json};

/// Returns embeddings in reverse order so the client must sort by index.
async fn embeddings(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer sk-test") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "message": "invalid api key" } })),
        );
    }

    let inputs = body["input"].as_array().cloned().unwrap_or_default();
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .rev()
        .map(|(index, text)| {
            let len = text.as_str().map_or(0, str::len);
            json!({ "object": "embedding", "index": index, "embedding": [len as f32, 0.5] })
        })
        .collect();
    (StatusCode::OK, Json(json!({ "object": "list", "data": data })))
}

async fn server() -> String {
    let app = Router::new().route("/v1/embeddings", post(embeddings));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn batch_results_follow_input_order() {
    let base = server().await;
    let provider = OpenAIEmbeddingProvider::new(&base, "all-MiniLM-L6-v2")
        .with_api_key("sk-test")
        .discover_dimensions()
        .await
        .unwrap();

    assert_eq!(provider.dimensions(), 2);
    let vectors = provider.embed_batch(&["a", "abc", "ab"]).await.unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.5], vec![3.0, 0.5], vec![2.0, 0.5]]);
}

#[tokio::test]
async fn api_error_message_is_surfaced() {
    let base = server().await;
    let provider = OpenAIEmbeddingProvider::new(&base, "all-MiniLM-L6-v2").with_dimensions(2);

    let err = provider.embed("hello").await.unwrap_err();

    match err {
        RagError::EmbeddingError { provider, message } => {
            assert_eq!(provider, "openai");
            assert!(message.contains("invalid api key"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
