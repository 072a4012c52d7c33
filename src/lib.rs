//! Retrieval-augmented conversational assistant.
//!
//! Two cooperating subsystems behind one facade:
//!
//! ```text
//!   sources (files / dirs / URLs)
//!        |
//!   TextDocumentLoader ──► chunker ──► content addressing
//!        |                                   |
//!   DocumentCache                    SqliteVectorStore ◄── EmbeddingProvider
//!                                            |
//!                                       Retriever
//!                                            |
//!   user input ──► ConversationAgent ──► ToolRegistry (retrieve_documents)
//!                        |
//!                 ThreadCheckpointer (per-thread memory)
//! ```
//!
//! Ingestion turns raw sources into content-addressed chunks so re-runs are
//! idempotent and incremental. The agent runs a model/tools loop per turn
//! and checkpoints each thread's history after the turn completes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ragpilot::config::AssistantConfig;
//! use ragpilot::embeddings::MockEmbeddingProvider;
//! use ragpilot::ingestion::IngestRequest;
//! use ragpilot::message::Message;
//! use ragpilot::service::AssistantService;
//! # use ragpilot::agent::ChatModel;
//! # async fn demo(model: Arc<dyn ChatModel>) -> Result<(), Box<dyn std::error::Error>> {
//! let service = AssistantService::new(
//!     AssistantConfig::default(),
//!     Arc::new(MockEmbeddingProvider::new()),
//!     model,
//! )
//! .await?;
//!
//! let ingested = service
//!     .ingest_documents(IngestRequest::new("notes/syllabus.txt"))
//!     .await;
//! assert!(ingested.success);
//!
//! let answer = service
//!     .ask(vec![Message::user("What does the syllabus say about grading?")], None)
//!     .await;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod ingestion;
pub mod message;
pub mod retriever;
pub mod service;
pub mod store;
pub mod tools;

pub use agent::{ChatModel, ConversationAgent, ModelOutcome, ThreadCheckpointer};
pub use config::AssistantConfig;
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider, OllamaEmbeddings};
pub use errors::{AgentError, RagError};
pub use ingestion::{IngestRequest, IngestionPipeline, IngestionReport, UpdateMode};
pub use message::{Message, ToolCall};
pub use retriever::{RetrievedDocument, Retriever};
pub use service::AssistantService;
pub use store::{SqliteVectorStore, VectorIndex, VectorRecord};
