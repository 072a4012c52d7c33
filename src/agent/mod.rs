//! Tool-augmented conversation agent with per-thread memory.
//!
//! [`ConversationAgent`] owns the model, the tool registry, and the
//! checkpointer. Each call to [`ConversationAgent::ask`] runs one full turn
//! on a named thread: load the thread's history, append the new input, loop
//! model → tools → model until a final answer, then checkpoint the grown
//! history. A failed turn leaves the previous checkpoint untouched.

pub mod checkpoint;
pub mod model;
pub mod turn;

use std::sync::Arc;

use tracing::{info, instrument};

use crate::errors::AgentError;
use crate::message::Message;
use crate::tools::ToolRegistry;

pub use checkpoint::{
    InMemoryThreadStore, SqliteThreadStore, ThreadCheckpoint, ThreadCheckpointer,
};
pub use model::{ChatModel, ModelOutcome};
pub use turn::run_turn;

pub struct ConversationAgent {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    checkpointer: Arc<dyn ThreadCheckpointer>,
    system_prompt: Option<String>,
    max_tool_rounds: Option<usize>,
}

impl ConversationAgent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: ToolRegistry,
        checkpointer: Arc<dyn ThreadCheckpointer>,
    ) -> Self {
        Self {
            model,
            tools,
            checkpointer,
            system_prompt: None,
            max_tool_rounds: Some(crate::config::DEFAULT_MAX_TOOL_ROUNDS),
        }
    }

    /// Sets a system prompt prepended once to each fresh thread.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Caps tool rounds per turn. `None` removes the cap.
    #[must_use]
    pub fn with_max_tool_rounds(mut self, max_tool_rounds: Option<usize>) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Runs one turn on `thread_id` with `input` appended to its history.
    ///
    /// Returns the final answer. The checkpoint is written only after the
    /// turn completes, so a mid-turn failure rolls the thread back to its
    /// last completed turn.
    #[instrument(skip(self, input))]
    pub async fn ask(&self, input: Vec<Message>, thread_id: &str) -> Result<String, AgentError> {
        let mut history = match self.checkpointer.load(thread_id).await? {
            Some(checkpoint) => checkpoint.messages,
            None => match &self.system_prompt {
                Some(prompt) => vec![Message::system(prompt)],
                None => Vec::new(),
            },
        };
        history.extend(input);

        let answer = run_turn(
            self.model.as_ref(),
            &self.tools,
            &mut history,
            self.max_tool_rounds,
        )
        .await?;

        self.checkpointer
            .save(ThreadCheckpoint::new(thread_id, history))
            .await?;
        info!(thread_id, "turn completed");
        Ok(answer)
    }

    /// Ids of every thread that has completed at least one turn.
    pub async fn threads(&self) -> Result<Vec<String>, AgentError> {
        self.checkpointer.list_threads().await
    }
}
