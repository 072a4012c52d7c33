//! Retrieval exposed as a model-callable tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::retriever::Retriever;

use super::{Tool, ToolError};

#[derive(Debug, Deserialize)]
struct RetrieveArguments {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

/// Searches the vector store and returns ranked passages with provenance.
pub struct RetrieveDocumentsTool {
    retriever: Arc<Retriever>,
}

impl RetrieveDocumentsTool {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for RetrieveDocumentsTool {
    fn name(&self) -> &str {
        "retrieve_documents"
    }

    fn description(&self) -> &str {
        "Search the ingested document store for passages relevant to a query. \
         Arguments: query (string, required), top_k (integer, optional)."
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: RetrieveArguments = serde_json::from_value(arguments)
            .map_err(|err| ToolError::InvalidArguments(err.to_string()))?;
        let top_k = args.top_k.unwrap_or(self.retriever.default_top_k());
        let documents = self
            .retriever
            .retrieve(&args.query, Some(top_k))
            .await
            .map_err(|err| ToolError::Execution(err.to_string()))?;
        Ok(json!({
            "success": true,
            "query": args.query,
            "top_k": top_k,
            "total_results": documents.len(),
            "documents": documents,
        }))
    }
}
