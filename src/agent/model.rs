//! Chat model seam.

use async_trait::async_trait;

use crate::errors::AgentError;
use crate::message::{Message, ToolCall};

/// What the model produced for one invocation.
///
/// The two cases are mutually exclusive by construction: an outcome either
/// ends the turn with text or requests tools, never both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelOutcome {
    /// The model answered; the turn is over.
    FinalAnswer(String),
    /// The model wants one or more tools run before it answers.
    ToolRequest(Vec<ToolCall>),
}

impl ModelOutcome {
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::FinalAnswer(_))
    }
}

/// A conversational model invoked with the full visible history.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<ModelOutcome, AgentError>;
}
