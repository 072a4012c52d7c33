//! Vector index seam and its SQLite implementation.
//!
//! [`VectorIndex`] is the boundary the ingestion pipeline and retriever
//! share: keyed writes with skip/upsert semantics and cosine-similarity
//! queries. [`SqliteVectorStore`] is the production backend.

pub mod sqlite;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::RagError;

pub use sqlite::SqliteVectorStore;

/// One addressable record in the index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Content address, unique within a collection.
    pub id: String,
    pub source: String,
    pub page: u32,
    pub chunk_index: usize,
    pub content: String,
    pub metadata: serde_json::Value,
    /// Populated by the store at write time; `None` on records returned
    /// from queries.
    pub embedding: Option<Vec<f32>>,
}

impl VectorRecord {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        page: u32,
        chunk_index: usize,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            page,
            chunk_index,
            content: content.into(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            embedding: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Outcome of an upsert batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertReport {
    /// Identifiers that were new to the store.
    pub added: usize,
    /// Identifiers that already existed and were overwritten.
    pub updated: usize,
}

/// Keyed vector index with similarity search.
///
/// Writes are atomic per batch. Concurrent ingestions of the same source are
/// not guarded against each other: `insert_new` re-filters against the live
/// identifier set inside its own transaction, so the race degrades to
/// duplicate work, never to duplicate records.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// All identifiers currently present.
    async fn existing_ids(&self) -> Result<HashSet<String>, RagError>;

    /// Writes only the records whose identifiers are not yet present.
    /// Returns the number written.
    async fn insert_new(&self, records: Vec<VectorRecord>) -> Result<usize, RagError>;

    /// Writes every record, overwriting existing identifiers in place.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<UpsertReport, RagError>;

    /// The `k` records most similar to `query`, best first, with cosine
    /// similarity scores in `[-1, 1]`. Ties are broken in backend order.
    ///
    /// Fails with [`RagError::EmptyQuery`] when `query` is blank and
    /// [`RagError::InvalidParameters`] when `k` is zero.
    async fn query(&self, query: &str, k: usize)
        -> Result<Vec<(VectorRecord, f32)>, RagError>;

    /// Deletes every record in the collection and returns how many there
    /// were before deletion.
    async fn clear(&self) -> Result<usize, RagError>;

    /// Number of records in the collection.
    async fn count(&self) -> Result<usize, RagError>;
}
