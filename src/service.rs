//! Assistant facade: one object wiring loader, store, retriever, and agent.
//!
//! [`AssistantService`] is the process-wide entry point the external
//! interfaces (CLI, server, tests) talk to. Its document operations never
//! return `Err`: every failure is folded into a structured response with
//! `success: false`, so a batch of ingestions degrades per source instead
//! of aborting. Conversation errors degrade to an `Error: ...` answer the
//! caller can surface verbatim.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::agent::{ChatModel, ConversationAgent, SqliteThreadStore};
use crate::config::AssistantConfig;
use crate::embeddings::EmbeddingProvider;
use crate::ingestion::{
    CacheStats, DocumentCache, IngestRequest, IngestionPipeline, IngestionReport,
    TextDocumentLoader,
};
use crate::message::Message;
use crate::retriever::{RetrievedDocument, Retriever};
use crate::store::{SqliteVectorStore, VectorIndex};
use crate::tools::{RetrieveDocumentsTool, ToolRegistry};

/// Outcome of one ingestion call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<IngestionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one retrieval call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub success: bool,
    pub query: String,
    pub top_k: usize,
    pub total_results: usize,
    pub documents: Vec<RetrievedDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Diagnostic snapshot of the vector store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreInfo {
    pub exists: bool,
    pub collection_name: String,
    pub storage_path: String,
    pub document_count: usize,
    /// `"active"`, `"not_initialized"`, or `"error"`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_metadata: Option<serde_json::Value>,
    pub cache: CacheStats,
}

/// Outcome of a store-clearing call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub success: bool,
    pub deleted: usize,
    pub message: String,
}

pub struct AssistantService {
    config: AssistantConfig,
    cache: DocumentCache,
    store: Arc<SqliteVectorStore>,
    pipeline: IngestionPipeline,
    retriever: Arc<Retriever>,
    agent: ConversationAgent,
}

impl AssistantService {
    /// Wires the full service: vector store and thread memory on the same
    /// SQLite file, the retrieval tool registered with the agent.
    ///
    /// The embedder and model are injected so tests and offline runs swap
    /// them without touching the wiring.
    pub async fn new(
        config: AssistantConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn ChatModel>,
    ) -> Result<Self, crate::errors::RagError> {
        let loader = Arc::new(TextDocumentLoader::new(
            config.cache_dir.clone(),
            config.enable_cache,
        ));
        let cache = loader.cache().clone();

        let store = Arc::new(
            SqliteVectorStore::open(
                &config.storage_path,
                config.collection_name.clone(),
                embedder.clone(),
            )
            .await?,
        );
        let index: Arc<dyn VectorIndex> = store.clone();
        let pipeline = IngestionPipeline::new(
            loader,
            index.clone(),
            config.chunk_size,
            config.chunk_overlap,
        );
        let retriever = Arc::new(Retriever::new(index, config.top_k));

        let checkpointer = SqliteThreadStore::open(&config.storage_path)
            .await
            .map_err(|err| crate::errors::RagError::Storage(err.to_string()))?;
        let tools = ToolRegistry::new()
            .with_tool(Arc::new(RetrieveDocumentsTool::new(retriever.clone())));
        let agent = ConversationAgent::new(model, tools, Arc::new(checkpointer))
            .with_max_tool_rounds(config.max_tool_rounds)
            .with_system_prompt(
                "You are a document assistant. Use the retrieve_documents tool to \
                 ground answers in the ingested corpus; cite source and page.",
            );

        info!(
            collection = %config.collection_name,
            storage = %config.storage_path.display(),
            embedder = embedder.id(),
            "assistant service ready"
        );
        Ok(Self {
            config,
            cache,
            store,
            pipeline,
            retriever,
            agent,
        })
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Ingests one source. Errors come back inside the response.
    pub async fn ingest_documents(&self, request: IngestRequest) -> IngestResponse {
        let source = request.source.clone();
        match self.pipeline.ingest(&request).await {
            Ok(report) => IngestResponse {
                success: true,
                source,
                report: Some(report),
                error: None,
            },
            Err(err) => {
                error!(%source, %err, "ingestion failed");
                IngestResponse {
                    success: false,
                    source,
                    report: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Retrieves passages for a query. Errors come back inside the response.
    pub async fn retrieve_documents(&self, query: &str, top_k: Option<usize>) -> RetrieveResponse {
        let k = top_k.unwrap_or(self.config.top_k);
        match self.retriever.retrieve(query, Some(k)).await {
            Ok(documents) => RetrieveResponse {
                success: true,
                query: query.to_string(),
                top_k: k,
                total_results: documents.len(),
                documents,
                error: None,
            },
            Err(err) => {
                error!(query, %err, "retrieval failed");
                RetrieveResponse {
                    success: false,
                    query: query.to_string(),
                    top_k: k,
                    total_results: 0,
                    documents: Vec::new(),
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Reports store status, record count, a metadata sample, and cache
    /// statistics.
    pub async fn vector_store_info(&self) -> StoreInfo {
        let cache = self.cache.stats(self.config.enable_cache).await;
        let storage_path = self.config.storage_path.display().to_string();
        match self.store.count().await {
            Ok(count) => {
                let sample_metadata = if count > 0 {
                    self.store.sample_metadata().await.unwrap_or(None)
                } else {
                    None
                };
                StoreInfo {
                    exists: count > 0,
                    collection_name: self.config.collection_name.clone(),
                    storage_path,
                    document_count: count,
                    status: if count > 0 { "active" } else { "not_initialized" }.to_string(),
                    sample_metadata,
                    cache,
                }
            }
            Err(err) => {
                error!(%err, "store info query failed");
                StoreInfo {
                    exists: false,
                    collection_name: self.config.collection_name.clone(),
                    storage_path,
                    document_count: 0,
                    status: "error".to_string(),
                    sample_metadata: None,
                    cache,
                }
            }
        }
    }

    /// Deletes every record in the collection. Requires `confirm: true`;
    /// an unconfirmed call deletes nothing.
    pub async fn clear_vector_store(&self, confirm: bool) -> ClearResponse {
        if !confirm {
            return ClearResponse {
                success: false,
                deleted: 0,
                message: "confirmation required; pass confirm=true to delete all records"
                    .to_string(),
            };
        }
        match self.store.clear().await {
            Ok(deleted) => ClearResponse {
                success: true,
                deleted,
                message: format!("deleted {deleted} records"),
            },
            Err(err) => {
                error!(%err, "clearing the store failed");
                ClearResponse {
                    success: false,
                    deleted: 0,
                    message: err.to_string(),
                }
            }
        }
    }

    /// Download-cache statistics on their own.
    pub async fn cache_info(&self) -> CacheStats {
        self.cache.stats(self.config.enable_cache).await
    }

    /// Clears the download cache, returning how many files were removed.
    pub async fn clear_cache(&self) -> usize {
        self.cache.clear().await.unwrap_or(0)
    }

    /// Runs one conversation turn. A missing `thread_id` routes to the
    /// configured default thread, which all such callers share.
    ///
    /// Never fails: a turn error degrades to an `Error: ...` answer and the
    /// thread keeps its last checkpoint.
    pub async fn ask(&self, input: Vec<Message>, thread_id: Option<&str>) -> String {
        let thread_id = thread_id.unwrap_or(&self.config.default_thread_id);
        match self.agent.ask(input, thread_id).await {
            Ok(answer) => answer,
            Err(err) => {
                error!(thread_id, %err, "conversation turn failed");
                format!("Error: {err}")
            }
        }
    }

    /// Ids of threads with at least one completed turn.
    pub async fn threads(&self) -> Vec<String> {
        self.agent.threads().await.unwrap_or_default()
    }
}
