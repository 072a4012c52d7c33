//! Similarity retrieval over the vector index.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::RagError;
use crate::store::VectorIndex;

/// Where a retrieved passage came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentProvenance {
    pub source: String,
    pub page: u32,
    pub chunk_index: usize,
}

/// One ranked retrieval hit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// 1-based rank, best match first.
    pub rank: usize,
    pub content: String,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub score: f32,
    pub provenance: DocumentProvenance,
    pub metadata: serde_json::Value,
}

/// Thin ranking layer over a [`VectorIndex`].
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    default_top_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, default_top_k: usize) -> Self {
        Self {
            index,
            default_top_k,
        }
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Returns up to `top_k` passages most similar to `query`, best first.
    ///
    /// `top_k` of `None` uses the configured default. Fewer than `top_k`
    /// results is not an error; an empty store yields an empty list. Equal
    /// scores keep the index's own order.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<RetrievedDocument>, RagError> {
        let k = top_k.unwrap_or(self.default_top_k);
        let hits = self.index.query(query, k).await?;
        debug!(query, k, results = hits.len(), "retrieval complete");
        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, (record, score))| RetrievedDocument {
                rank: i + 1,
                content: record.content,
                score,
                provenance: DocumentProvenance {
                    source: record.source,
                    page: record.page,
                    chunk_index: record.chunk_index,
                },
                metadata: record.metadata,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;
    use crate::store::{SqliteVectorStore, VectorRecord};
    use tempfile::TempDir;

    async fn seeded_retriever(dir: &TempDir) -> Retriever {
        let store = SqliteVectorStore::open(
            dir.path().join("store.db"),
            "test",
            Arc::new(MockEmbeddingProvider::new()),
        )
        .await
        .unwrap();
        store
            .insert_new(vec![
                VectorRecord::new("a", "guide.txt", 0, 0, "how to install the toolchain"),
                VectorRecord::new("b", "guide.txt", 0, 1, "how to configure logging"),
                VectorRecord::new("c", "faq.txt", 2, 0, "troubleshooting network errors"),
            ])
            .await
            .unwrap();
        Retriever::new(Arc::new(store), 5)
    }

    #[tokio::test]
    async fn ranks_start_at_one_and_scores_descend() {
        let dir = TempDir::new().unwrap();
        let retriever = seeded_retriever(&dir).await;
        let results = retriever
            .retrieve("how to install the toolchain", None)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.rank, i + 1);
        }
        for window in results.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
        assert_eq!(results[0].provenance.source, "guide.txt");
    }

    #[tokio::test]
    async fn explicit_top_k_overrides_the_default() {
        let dir = TempDir::new().unwrap();
        let retriever = seeded_retriever(&dir).await;
        let results = retriever.retrieve("logging", Some(1)).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn fewer_hits_than_requested_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let retriever = seeded_retriever(&dir).await;
        let results = retriever.retrieve("anything", Some(50)).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let dir = TempDir::new().unwrap();
        let retriever = seeded_retriever(&dir).await;
        let err = retriever.retrieve("  \t ", None).await.unwrap_err();
        assert!(matches!(err, RagError::EmptyQuery));
    }
}
