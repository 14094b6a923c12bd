//! Integration tests for the query orchestrator, using deterministic fake
//! backends.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use jarvis_rag::document::{DocumentInput, ScoredRecord, VectorRecord};
use jarvis_rag::{
    APOLOGY_ANSWER, EmbeddingProvider, Generator, InMemoryVectorStore, IndexStats, KnowledgeStore,
    RagConfig, RagEngine, RagError, Result, Role, VectorStore,
};

const DIMS: usize = 256;
const INDEX: &str = "jarvis-test";

// ── Fakes ──────────────────────────────────────────────────────────

/// Bag-of-words embedder: texts sharing the same words embed identically.
#[derive(Default)]
struct WordHashEmbedder {
    calls: AtomicUsize,
}

fn bucket(word: &str) -> usize {
    let hash = word.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    });
    (hash % DIMS as u64) as usize
}

#[async_trait]
impl EmbeddingProvider for WordHashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut vector = vec![0.0; DIMS];
        for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            vector[bucket(word)] += 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    fn name(&self) -> &str {
        "word-hash"
    }
}

/// Records every prompt and answers `answer N` for the N-th call.
#[derive(Default)]
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingGenerator {
    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model(&self) -> &str {
        "recording"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::GenerationError {
                backend: "recording".into(),
                message: "API returned 500 Internal Server Error".into(),
            });
        }
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        Ok(format!("answer {}", prompts.len()))
    }

    async fn check_connection(&self) -> bool {
        !self.fail.load(Ordering::SeqCst)
    }
}

/// In-memory store that can be told to fail queries, stats or the N-th upsert.
struct FlakyStore {
    inner: InMemoryVectorStore,
    fail_query: AtomicBool,
    fail_stats: AtomicBool,
    upserts: AtomicUsize,
    fail_upsert_at: Option<usize>,
}

impl FlakyStore {
    fn new(fail_upsert_at: Option<usize>) -> Self {
        Self {
            inner: InMemoryVectorStore::new(),
            fail_query: AtomicBool::new(false),
            fail_stats: AtomicBool::new(false),
            upserts: AtomicUsize::new(0),
            fail_upsert_at,
        }
    }

    fn unavailable() -> RagError {
        RagError::VectorStoreError { backend: "flaky".into(), message: "service unavailable".into() }
    }
}

#[async_trait]
impl VectorStore for FlakyStore {
    async fn ensure_index(&self, name: &str, dimensions: usize) -> Result<()> {
        self.inner.ensure_index(name, dimensions).await
    }

    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()> {
        let call = self.upserts.fetch_add(1, Ordering::SeqCst);
        if Some(call) == self.fail_upsert_at {
            return Err(Self::unavailable());
        }
        self.inner.upsert(index, records).await
    }

    async fn query(&self, index: &str, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredRecord>> {
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.query(index, embedding, top_k).await
    }

    async fn delete_all(&self, index: &str) -> Result<()> {
        self.inner.delete_all(index).await
    }

    async fn describe_stats(&self, index: &str) -> Result<IndexStats> {
        if self.fail_stats.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.describe_stats(index).await
    }

    fn backend_name(&self) -> &str {
        "flaky"
    }
}

struct Harness {
    engine: RagEngine,
    embedder: Arc<WordHashEmbedder>,
    generator: Arc<RecordingGenerator>,
    store: Arc<FlakyStore>,
}

async fn harness_with(config: RagConfig, store: FlakyStore) -> Harness {
    let embedder = Arc::new(WordHashEmbedder::default());
    let generator = Arc::new(RecordingGenerator::default());
    let store = Arc::new(store);

    let knowledge = KnowledgeStore::open(embedder.clone(), store.clone(), INDEX, &config)
        .await
        .unwrap();
    let engine = RagEngine::builder()
        .config(config)
        .knowledge(knowledge)
        .generator(generator.clone())
        .build()
        .unwrap();

    Harness { engine, embedder, generator, store }
}

async fn harness() -> Harness {
    harness_with(RagConfig::default(), FlakyStore::new(None)).await
}

// ── Answering ──────────────────────────────────────────────────────

#[tokio::test]
async fn answering_without_context_never_searches() {
    let h = harness().await;

    let result = h.engine.answer("What time is it?", false, None).await;

    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
    assert!(!result.used_context);
    assert!(result.context.is_empty());
    assert_eq!(result.answer, "answer 1");
    assert!(result.is_ok());
    assert!(!h.generator.prompts()[0].contains("Context information:"));
}

#[tokio::test]
async fn matching_question_retrieves_its_document() {
    let h = harness().await;
    h.engine
        .add_knowledge("Remote work is allowed on Fridays.", Some("Policy"), None)
        .await
        .unwrap();
    h.engine
        .add_knowledge("The cafeteria serves lunch at noon.", Some("Menu"), None)
        .await
        .unwrap();

    let result = h.engine.answer("Is remote work allowed on Fridays?", true, None).await;

    assert!(result.used_context);
    assert!(result.retrieval_error.is_none());
    assert_eq!(result.context[0].text, "Remote work is allowed on Fridays.");
    assert_eq!(result.context[0].metadata["doc_name"], "Policy");
    assert_eq!(result.context[0].metadata["doc_type"], "text");
    assert!((result.context[0].score - 1.0).abs() < 1e-5);
    for pair in result.context.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    let prompt = &h.generator.prompts()[0];
    assert!(prompt.contains("Context information:\n1. Remote work is allowed on Fridays.\n"));
    assert!(prompt.ends_with("User: Is remote work allowed on Fridays?\nAssistant:"));
}

#[tokio::test]
async fn empty_knowledge_base_answers_without_context() {
    let h = harness().await;

    let result = h.engine.answer("Anything stored?", true, None).await;

    assert!(!result.used_context);
    assert!(result.context.is_empty());
    assert!(result.retrieval_error.is_none());
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn explicit_top_k_bounds_context() {
    let h = harness().await;
    let documents: Vec<DocumentInput> = (0..5)
        .map(|i| DocumentInput::new(format!("Shared words number {i}.")))
        .collect();
    assert_eq!(h.engine.add_documents(&documents).await.unwrap(), 5);

    let two = h.engine.answer("shared words", true, Some(2)).await;
    assert_eq!(two.context.len(), 2);

    let none = h.engine.answer("shared words", true, Some(0)).await;
    assert!(none.context.is_empty());
    assert!(!none.used_context);
}

#[tokio::test]
async fn cleared_conversation_starts_over() {
    let h = harness().await;
    h.engine.answer("old question", false, None).await;
    h.engine.clear_conversation().await;
    assert!(h.engine.history().await.is_empty());

    h.engine.answer("first question", false, None).await;
    h.engine.answer("second question", false, None).await;

    let prompts = h.generator.prompts();
    assert!(!prompts[1].contains("Recent conversation:"));
    assert!(prompts[2].contains("Recent conversation:\nUser: first question\nAssistant: answer 2\n\n"));
    assert!(!prompts[2].contains("old question"));

    let history = h.engine.history().await;
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[3].content, "answer 3");
}

#[tokio::test]
async fn generation_failure_returns_apology_and_keeps_history() {
    let h = harness().await;
    h.engine.add_knowledge("Remote work is allowed.", None, None).await.unwrap();
    h.generator.fail.store(true, Ordering::SeqCst);

    let result = h.engine.answer("Is remote work allowed?", true, None).await;

    assert_eq!(result.answer, APOLOGY_ANSWER);
    assert!(result.error.as_deref().is_some_and(|e| e.contains("500")));
    assert!(!result.used_context);
    assert!(result.context.is_empty());
    assert!(h.engine.history().await.is_empty());
}

#[tokio::test]
async fn retrieval_failure_degrades_to_no_context() {
    let h = harness().await;
    h.engine.add_knowledge("Remote work is allowed.", None, None).await.unwrap();
    h.store.fail_query.store(true, Ordering::SeqCst);

    let result = h.engine.answer("Is remote work allowed?", true, None).await;

    assert!(result.is_ok());
    assert_eq!(result.answer, "answer 1");
    assert!(!result.used_context);
    assert!(result.retrieval_error.as_deref().is_some_and(|e| e.contains("unavailable")));
    assert_eq!(h.engine.history().await.len(), 2);
}

#[tokio::test]
async fn lenient_search_degrades_to_empty() {
    let h = harness().await;
    h.engine.add_knowledge("Remote work is allowed.", None, None).await.unwrap();
    assert_eq!(h.engine.knowledge().search("remote work", None).await.len(), 1);

    h.store.fail_query.store(true, Ordering::SeqCst);

    assert!(h.engine.knowledge().search("remote work", None).await.is_empty());
    assert!(h.engine.knowledge().try_search("remote work", None).await.is_err());
}

#[tokio::test]
async fn unreachable_index_reports_empty_stats() {
    let h = harness().await;
    h.engine.add_knowledge("Remote work is allowed.", None, None).await.unwrap();
    h.engine.answer("hello", false, None).await;

    h.store.fail_stats.store(true, Ordering::SeqCst);

    assert!(h.engine.knowledge().stats().await.is_empty());
    let stats = h.engine.stats().await;
    assert!(stats.vector_store.is_empty());
    assert_eq!(stats.conversation_length, 2);
}

#[test]
fn query_result_omits_absent_errors_when_serialized() {
    let ok = jarvis_rag::QueryResult {
        question: "q".into(),
        answer: "a".into(),
        context: Vec::new(),
        used_context: false,
        error: None,
        retrieval_error: None,
    };
    let json = serde_json::to_value(&ok).unwrap();
    assert!(json.get("error").is_none());
    assert!(json.get("retrieval_error").is_none());

    let failed = serde_json::to_value(jarvis_rag::QueryResult::failed("q", "boom")).unwrap();
    assert_eq!(failed["error"], "boom");
    assert_eq!(failed["answer"], APOLOGY_ANSWER);
}

// ── Ingestion ──────────────────────────────────────────────────────

#[tokio::test]
async fn whitespace_document_stores_nothing() {
    let h = harness().await;
    assert_eq!(h.engine.add_knowledge("   \n ", None, None).await.unwrap(), 0);
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_batch_keeps_earlier_batches() {
    let config = RagConfig::builder().upsert_batch_size(2).build().unwrap();
    let h = harness_with(config, FlakyStore::new(Some(1))).await;
    let documents: Vec<DocumentInput> =
        ["Alpha fact.", "Beta fact.", "Gamma fact."].into_iter().map(DocumentInput::new).collect();

    let err = h.engine.add_documents(&documents).await.unwrap_err();

    match err {
        RagError::PipelineError(message) => {
            assert!(message.contains("batch 1 failed after 2 chunks were stored"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let stats = h.engine.knowledge().try_stats().await.unwrap();
    assert_eq!(stats.total_vector_count, 2);
}

#[tokio::test]
async fn file_ingestion_uses_file_name() {
    let h = harness().await;
    let dir = std::env::temp_dir().join(format!("jarvis-engine-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join("faq.txt");
    tokio::fs::write(&path, "Parking is free for visitors.").await.unwrap();

    assert_eq!(h.engine.add_knowledge_from_file(&path).await.unwrap(), 1);
    let hits = h.engine.knowledge().search("parking is free for visitors", None).await;
    assert_eq!(hits[0].metadata["doc_name"], "faq.txt");
    assert_eq!(hits[0].metadata["doc_type"], "text_file");

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn empty_file_stores_nothing() {
    let h = harness().await;
    let dir = std::env::temp_dir().join(format!("jarvis-engine-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join("empty.txt");
    tokio::fs::write(&path, "  \n").await.unwrap();

    assert_eq!(h.engine.add_knowledge_from_file(&path).await.unwrap(), 0);
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);

    let missing = h.engine.add_knowledge_from_file(dir.join("missing.txt")).await;
    assert!(matches!(missing, Err(RagError::Io(_))));

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn clearing_knowledge_empties_the_index() {
    let h = harness().await;
    h.engine.add_knowledge("Remote work is allowed.", None, None).await.unwrap();

    h.engine.clear_knowledge().await.unwrap();

    let result = h.engine.answer("Is remote work allowed?", true, None).await;
    assert!(!result.used_context);
    assert_eq!(h.engine.stats().await.vector_store["total_vector_count"], 0);
}

// ── Lifecycle ──────────────────────────────────────────────────────

#[tokio::test]
async fn stats_report_index_and_conversation() {
    let h = harness().await;
    h.engine.add_knowledge("Remote work is allowed.", None, None).await.unwrap();
    h.engine.answer("hello", false, None).await;

    let stats = h.engine.stats().await;
    assert_eq!(stats.vector_store["total_vector_count"], 1);
    assert_eq!(stats.vector_store["dimension"], DIMS);
    assert_eq!(stats.conversation_length, 2);
}

#[tokio::test]
async fn health_reflects_generator_reachability() {
    let h = harness().await;
    let healthy = h.engine.check_health().await;
    assert!(healthy.llm && healthy.vector_store && healthy.overall);

    h.generator.fail.store(true, Ordering::SeqCst);
    let degraded = h.engine.check_health().await;
    assert!(!degraded.llm);
    assert!(degraded.vector_store);
    assert!(!degraded.overall);
}

#[tokio::test]
async fn reopening_index_with_other_dimensions_is_fatal() {
    let store = Arc::new(InMemoryVectorStore::new());
    store.ensure_index(INDEX, 8).await.unwrap();

    let err = KnowledgeStore::open(
        Arc::new(WordHashEmbedder::default()),
        store,
        INDEX,
        &RagConfig::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, RagError::DimensionMismatch { expected: 8, actual: DIMS }));
}

#[tokio::test]
async fn builder_requires_a_generator() {
    let config = RagConfig::default();
    let knowledge = KnowledgeStore::open(
        Arc::new(WordHashEmbedder::default()),
        Arc::new(InMemoryVectorStore::new()),
        INDEX,
        &config,
    )
    .await
    .unwrap();

    let err = RagEngine::builder().config(config).knowledge(knowledge).build().unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));
}
