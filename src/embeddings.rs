//! Embedding provider seam.
//!
//! The rest of the crate treats embedding as an opaque text-to-vector
//! function behind [`EmbeddingProvider`]. The handle is created once at
//! service construction and shared by reference between the ingestion
//! pipeline and the retriever, so there is no lazy first-call initialization
//! and no hidden global.
//!
//! [`MockEmbeddingProvider`] is exported for tests and offline runs: it is
//! fully deterministic, so identifier and retrieval tests do not depend on a
//! live model.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::errors::RagError;

/// Opaque text → vector function.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for logs and store info (e.g. model name).
    fn id(&self) -> &str;

    /// Embeds a batch of inputs, one vector per input, in input order.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Embeds a single input.
    async fn embed(&self, input: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self.embed_batch(&[input.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("provider returned an empty batch".to_string()))
    }
}

/// Deterministic hash-based embeddings for tests and offline pipelines.
///
/// The vector for a given text is a function of its SHA-256 digest only:
/// the same text always embeds identically, distinct texts almost always
/// differ. Vectors are L2-normalized so cosine distance behaves.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub const DEFAULT_DIMENSIONS: usize = 16;

    #[must_use]
    pub fn new() -> Self {
        Self {
            dimensions: Self::DEFAULT_DIMENSIONS,
        }
    }

    #[must_use]
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, input: &str) -> Vec<f32> {
        let digest = Sha256::digest(input.as_bytes());
        let mut vector = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            // Cycle over the digest, mixing the lane index in so dimensions
            // beyond 32 stay distinct.
            let byte = digest[i % digest.len()];
            let mixed = byte.wrapping_mul(31).wrapping_add((i as u8).wrapping_mul(7));
            vector.push(f32::from(mixed) / 255.0 - 0.5);
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn id(&self) -> &str {
        "mock"
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(inputs.iter().map(|input| self.embed_one(input)).collect())
    }
}

/// HTTP embedding provider speaking the Ollama `/api/embed` protocol.
#[derive(Clone, Debug)]
pub struct OllamaEmbeddings {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbeddings {
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    fn id(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/api/embed", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let parsed: OllamaEmbedResponse = response.json().await?;
        if parsed.embeddings.len() != inputs.len() {
            return Err(RagError::Embedding(format!(
                "expected {} vectors, got {}",
                inputs.len(),
                parsed.embeddings.len()
            )));
        }
        Ok(parsed.embeddings)
    }
}
