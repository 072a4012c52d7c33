//! Conversation turns through the service facade: grounded answers,
//! per-thread memory, and durable checkpoints.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use ragpilot::agent::{ChatModel, ModelOutcome};
use ragpilot::config::AssistantConfig;
use ragpilot::embeddings::MockEmbeddingProvider;
use ragpilot::errors::AgentError;
use ragpilot::ingestion::IngestRequest;
use ragpilot::message::{Message, ToolCall};
use ragpilot::service::AssistantService;

/// Retrieves on the first user turn, then answers with the top hit's text.
/// Counts model invocations so tests can assert loop shape.
struct RetrievingModel {
    invocations: AtomicUsize,
}

impl RetrievingModel {
    fn new() -> Self {
        Self {
            invocations: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChatModel for RetrievingModel {
    async fn complete(&self, messages: &[Message]) -> Result<ModelOutcome, AgentError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let last = messages.last().expect("history never empty");
        if last.has_role(Message::TOOL) {
            let parsed: serde_json::Value = serde_json::from_str(&last.content)
                .map_err(|err| AgentError::ModelInvocation(err.to_string()))?;
            let top = parsed["documents"][0]["content"]
                .as_str()
                .unwrap_or("nothing found");
            return Ok(ModelOutcome::FinalAnswer(format!("According to notes: {top}")));
        }
        let query = last.content.clone();
        Ok(ModelOutcome::ToolRequest(vec![ToolCall::new(
            "retrieve_documents",
            json!({ "query": query, "top_k": 1 }),
        )]))
    }
}

fn config(dir: &TempDir) -> AssistantConfig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    AssistantConfig::default()
        .with_storage_path(dir.path().join("assistant.db"))
        .with_cache_dir(dir.path().join("cache"))
        .with_chunking(80, 16)
}

async fn seeded_service(dir: &TempDir, model: Arc<dyn ChatModel>) -> AssistantService {
    let service = AssistantService::new(
        config(dir),
        Arc::new(MockEmbeddingProvider::new()),
        model,
    )
    .await
    .expect("service construction");

    let path = dir.path().join("notes.txt");
    tokio::fs::write(&path, "grading is thirty percent homework and seventy percent exams")
        .await
        .unwrap();
    let ingested = service
        .ingest_documents(IngestRequest::new(path.to_str().unwrap()))
        .await;
    assert!(ingested.success);
    service
}

#[tokio::test]
async fn a_turn_grounds_its_answer_in_retrieval() {
    let dir = TempDir::new().unwrap();
    let model = Arc::new(RetrievingModel::new());
    let service = seeded_service(&dir, model.clone()).await;

    let answer = service
        .ask(
            vec![Message::user(
                "grading is thirty percent homework and seventy percent exams",
            )],
            Some("t1"),
        )
        .await;
    assert!(answer.contains("thirty percent homework"));
    // One invocation to request the tool, one to answer.
    assert_eq!(model.invocations.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn omitted_thread_ids_share_the_default_thread() {
    let dir = TempDir::new().unwrap();
    let service = seeded_service(&dir, Arc::new(RetrievingModel::new())).await;

    service.ask(vec![Message::user("first")], None).await;
    service.ask(vec![Message::user("second")], None).await;

    let threads = service.threads().await;
    assert_eq!(threads, vec!["default"]);
}

#[tokio::test]
async fn named_threads_keep_separate_histories() {
    let dir = TempDir::new().unwrap();
    let service = seeded_service(&dir, Arc::new(RetrievingModel::new())).await;

    service.ask(vec![Message::user("alpha")], Some("alice")).await;
    service.ask(vec![Message::user("beta")], Some("bob")).await;

    assert_eq!(service.threads().await, vec!["alice", "bob"]);
}

#[tokio::test]
async fn memory_survives_service_restart() {
    let dir = TempDir::new().unwrap();

    struct CountingModel {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for CountingModel {
        async fn complete(&self, messages: &[Message]) -> Result<ModelOutcome, AgentError> {
            self.seen.store(messages.len(), Ordering::SeqCst);
            Ok(ModelOutcome::FinalAnswer(format!(
                "history has {} messages",
                messages.len()
            )))
        }
    }

    {
        let service = seeded_service(
            &dir,
            Arc::new(CountingModel {
                seen: AtomicUsize::new(0),
            }),
        )
        .await;
        service.ask(vec![Message::user("one")], Some("t1")).await;
    }

    // A fresh service over the same storage resumes the thread.
    let service = AssistantService::new(
        config(&dir),
        Arc::new(MockEmbeddingProvider::new()),
        Arc::new(CountingModel {
            seen: AtomicUsize::new(0),
        }),
    )
    .await
    .unwrap();
    let answer = service.ask(vec![Message::user("two")], Some("t1")).await;
    // system + user + assistant from turn one, plus the new user message.
    assert_eq!(answer, "history has 4 messages");
}

#[tokio::test]
async fn failed_turns_degrade_to_error_text_and_keep_memory_intact() {
    let dir = TempDir::new().unwrap();

    struct FlakyModel {
        fail_next: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for FlakyModel {
        async fn complete(&self, messages: &[Message]) -> Result<ModelOutcome, AgentError> {
            if self.fail_next.swap(0, Ordering::SeqCst) == 1 {
                return Err(AgentError::ModelInvocation("backend timeout".to_string()));
            }
            Ok(ModelOutcome::FinalAnswer(format!(
                "history has {} messages",
                messages.len()
            )))
        }
    }

    let model = Arc::new(FlakyModel {
        fail_next: AtomicUsize::new(0),
    });
    let service = seeded_service(&dir, model.clone()).await;

    let first = service.ask(vec![Message::user("one")], Some("t1")).await;
    assert!(first.starts_with("history has"));

    model.fail_next.store(1, Ordering::SeqCst);
    let failed = service.ask(vec![Message::user("two")], Some("t1")).await;
    assert!(failed.starts_with("Error:"));
    assert!(failed.contains("backend timeout"));

    // The failed turn left no trace: the next turn sees the checkpoint from
    // turn one plus its own input only.
    let recovered = service.ask(vec![Message::user("three")], Some("t1")).await;
    assert_eq!(recovered, "history has 4 messages");
}

#[tokio::test]
async fn runaway_tool_loops_are_capped() {
    let dir = TempDir::new().unwrap();

    struct LoopingModel;

    #[async_trait]
    impl ChatModel for LoopingModel {
        async fn complete(&self, _: &[Message]) -> Result<ModelOutcome, AgentError> {
            Ok(ModelOutcome::ToolRequest(vec![ToolCall::new(
                "retrieve_documents",
                json!({"query": "anything"}),
            )]))
        }
    }

    let service = AssistantService::new(
        config(&dir).with_max_tool_rounds(Some(3)),
        Arc::new(MockEmbeddingProvider::new()),
        Arc::new(LoopingModel),
    )
    .await
    .unwrap();

    let answer = service.ask(vec![Message::user("go")], Some("t1")).await;
    assert!(answer.starts_with("Error:"));
    assert!(answer.contains("tool round limit"));
    // The aborted turn is not checkpointed.
    assert!(service.threads().await.is_empty());
}
