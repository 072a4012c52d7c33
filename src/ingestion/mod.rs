//! Document ingestion: load → chunk → address → index.
//!
//! The pipeline turns raw sources into content-addressed vector records and
//! applies them to the index incrementally. Because chunk identifiers derive
//! from provenance rather than content, re-running ingestion over an
//! unchanged corpus is a no-op under [`UpdateMode::Skip`] and a targeted
//! refresh under [`UpdateMode::Upsert`].

pub mod address;
pub mod chunker;
pub mod loader;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::RagError;
use crate::store::{VectorIndex, VectorRecord};

pub use address::{address_chunk, chunk_id};
pub use chunker::chunk_documents;
pub use loader::{
    CacheStats, DocumentCache, DocumentLoader, SourceType, TextDocumentLoader,
};

/// A loaded page of a source document. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Source name (file name or URL tail).
    pub source: String,
    /// Zero-based page number within the source.
    pub page: u32,
    /// Raw page text.
    pub text: String,
    /// Arbitrary metadata inherited by chunks.
    pub metadata: serde_json::Value,
}

/// A bounded text segment derived from exactly one [`Document`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub source: String,
    pub page: u32,
    /// Sequential index within the document, starting at 0.
    pub chunk_index: usize,
    pub text: String,
    pub metadata: serde_json::Value,
}

/// How records whose identifiers already exist in the store are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Write only unseen identifiers; existing records are left untouched
    /// even if their source text changed.
    #[default]
    Skip,
    /// Write unseen identifiers and overwrite seen ones with the freshly
    /// computed chunk and embedding.
    Upsert,
}

/// One ingestion request. Chunking fields left at `None` use the pipeline's
/// configured defaults.
#[derive(Clone, Debug)]
pub struct IngestRequest {
    pub source: String,
    pub source_type: SourceType,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub update_mode: UpdateMode,
    /// Per-call override of the loader's download-cache setting.
    pub enable_cache: Option<bool>,
}

impl IngestRequest {
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            source_type: SourceType::Auto,
            chunk_size: None,
            chunk_overlap: None,
            update_mode: UpdateMode::Skip,
            enable_cache: None,
        }
    }

    #[must_use]
    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    #[must_use]
    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self.chunk_overlap = Some(chunk_overlap);
        self
    }

    #[must_use]
    pub fn with_update_mode(mut self, update_mode: UpdateMode) -> Self {
        self.update_mode = update_mode;
        self
    }

    #[must_use]
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.enable_cache = Some(enabled);
        self
    }
}

/// Statistics for one completed ingestion run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub source: String,
    pub source_type: SourceType,
    pub update_mode: UpdateMode,
    /// Pages loaded from the source.
    pub pages_loaded: usize,
    /// Chunks produced by this run (written or not).
    pub chunks_created: usize,
    /// Records newly written to the store.
    pub inserted: usize,
    /// Records overwritten in place (upsert mode only).
    pub updated: usize,
    /// Store-wide record count after this run.
    pub total_in_store: usize,
}

/// Composes loader, chunker, addresser, and index into idempotent,
/// incremental corpus updates.
pub struct IngestionPipeline {
    loader: Arc<dyn DocumentLoader>,
    index: Arc<dyn VectorIndex>,
    default_chunk_size: usize,
    default_chunk_overlap: usize,
}

impl IngestionPipeline {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        index: Arc<dyn VectorIndex>,
        default_chunk_size: usize,
        default_chunk_overlap: usize,
    ) -> Self {
        Self {
            loader,
            index,
            default_chunk_size,
            default_chunk_overlap,
        }
    }

    /// Runs one ingestion.
    ///
    /// Fails with [`RagError::NoDocumentsLoaded`] when the source yields
    /// nothing. The service layer recovers every error from here into a
    /// `{ success: false }` response, so one failing source never blocks a
    /// batch of others.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<IngestionReport, RagError> {
        let source_type = request.source_type.resolve(&request.source);
        info!(source = %request.source, ?source_type, "starting ingestion");

        let mut documents = self
            .loader
            .load(&request.source, source_type, request.enable_cache)
            .await?;
        if documents.is_empty() {
            return Err(RagError::NoDocumentsLoaded {
                source: request.source.clone(),
            });
        }
        // Loaders sort already; re-sorting here keeps identifier assignment
        // reproducible even with a third-party loader that forgot.
        documents.sort_by(|a, b| (a.source.as_str(), a.page).cmp(&(b.source.as_str(), b.page)));
        let pages_loaded = documents.len();

        let chunk_size = request.chunk_size.unwrap_or(self.default_chunk_size);
        let chunk_overlap = request.chunk_overlap.unwrap_or(self.default_chunk_overlap);
        let mut chunks = chunk_documents(&documents, chunk_size, chunk_overlap)?;
        let chunks_created = chunks.len();

        let mut records = Vec::with_capacity(chunks.len());
        for chunk in &mut chunks {
            let id = address_chunk(chunk);
            records.push(
                VectorRecord::new(id, &chunk.source, chunk.page, chunk.chunk_index, &chunk.text)
                    .with_metadata(chunk.metadata.clone()),
            );
        }

        let (inserted, updated) = match request.update_mode {
            UpdateMode::Skip => (self.index.insert_new(records).await?, 0),
            UpdateMode::Upsert => {
                let report = self.index.upsert(records).await?;
                (report.added, report.updated)
            }
        };
        let total_in_store = self.index.count().await?;

        info!(
            source = %request.source,
            pages_loaded,
            chunks_created,
            inserted,
            updated,
            total_in_store,
            "ingestion finished"
        );
        Ok(IngestionReport {
            source: request.source.clone(),
            source_type,
            update_mode: request.update_mode,
            pages_loaded,
            chunks_created,
            inserted,
            updated,
            total_in_store,
        })
    }
}
