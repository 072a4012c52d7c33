//! Tool seam for the conversation loop.
//!
//! Tools are async functions over JSON arguments. The registry dispatches
//! model-requested calls and folds every failure into the returned content
//! string, so a broken tool argues with the model instead of aborting the
//! turn.

pub mod retrieval;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::message::ToolCall;

pub use retrieval::RetrieveDocumentsTool;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    Unknown(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("tool execution failed: {0}")]
    Execution(String),
}

/// One callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to request this tool.
    fn name(&self) -> &str;

    /// Human-readable description surfaced to the model.
    fn description(&self) -> &str;

    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;
}

/// Named collection of tools with failure-absorbing dispatch.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Executes one requested call and renders the result as message content.
    ///
    /// Unknown tools, malformed arguments, and execution failures all come
    /// back as an error string rather than an `Err`: the model sees what
    /// went wrong and can retry or answer without the tool.
    pub async fn dispatch(&self, call: &ToolCall) -> String {
        let outcome = match self.get(&call.name) {
            Some(tool) => tool.call(call.arguments.clone()).await,
            None => Err(ToolError::Unknown(call.name.clone())),
        };
        match outcome {
            Ok(value) => {
                debug!(tool = %call.name, call_id = %call.id, "tool call succeeded");
                value.to_string()
            }
            Err(err) => {
                warn!(tool = %call.name, call_id = %call.id, %err, "tool call failed");
                format!("tool error: {err}")
            }
        }
    }
}
