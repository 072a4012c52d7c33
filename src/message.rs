//! Conversation messages and tool-call payloads.
//!
//! A [`Message`] is a role-tagged piece of content in a thread. An assistant
//! message may additionally carry one or more [`ToolCall`]s; each tool call is
//! answered by exactly one tool-role message (matched by `tool_call_id`)
//! before the model is invoked again.
//!
//! # Examples
//!
//! ```
//! use ragpilot::message::{Message, ToolCall};
//! use serde_json::json;
//!
//! let user = Message::user("What does the syllabus say about grading?");
//! assert!(user.has_role(Message::USER));
//!
//! let call = ToolCall::new("retrieve_documents", json!({"query": "grading"}));
//! let request = Message::assistant_tool_request(vec![call.clone()]);
//! assert!(request.requests_tools());
//!
//! let answer = Message::tool(&call.id, "{\"documents\": []}");
//! assert_eq!(answer.tool_call_id.as_deref(), Some(call.id.as_str()));
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A model-issued request to invoke a named external capability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique id correlating this call with its tool-result message.
    pub id: String,
    /// Name of the tool to invoke, as registered in the tool registry.
    pub name: String,
    /// JSON arguments for the tool.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Creates a tool call with a fresh v4 id.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }

    /// Creates a tool call with an explicit id (useful for replaying
    /// persisted conversations in tests).
    #[must_use]
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A message in a conversation thread.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The role of the sender. Use the constants on [`Message`] for
    /// standardized values.
    pub role: String,
    /// The text content of the message.
    pub content: String,
    /// Tool calls requested by an assistant message. Empty for every other
    /// role.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool-role messages, the id of the call being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// AI assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";
    /// Tool result message role.
    pub const TOOL: &'static str = "tool";

    /// Creates a new message with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message carrying a final answer.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Creates an assistant message that requests tool invocations instead of
    /// answering.
    #[must_use]
    pub fn assistant_tool_request(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Self::ASSISTANT.to_string(),
            content: String::new(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Creates a tool-result message answering the call with id
    /// `tool_call_id`.
    #[must_use]
    pub fn tool(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: Self::TOOL.to_string(),
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    /// Returns true if this is an assistant message carrying tool calls.
    #[must_use]
    pub fn requests_tools(&self) -> bool {
        self.has_role(Self::ASSISTANT) && !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn convenience_constructors_set_roles() {
        assert_eq!(Message::user("hi").role, Message::USER);
        assert_eq!(Message::assistant("hello").role, Message::ASSISTANT);
        assert_eq!(Message::system("be brief").role, Message::SYSTEM);
        assert_eq!(Message::tool("c1", "ok").role, Message::TOOL);
    }

    #[test]
    fn tool_request_round_trips_through_json() {
        let call = ToolCall::with_id("call-1", "retrieve_documents", json!({"query": "x"}));
        let original = Message::assistant_tool_request(vec![call]);

        let encoded = serde_json::to_string(&original).expect("serialize");
        let decoded: Message = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(original, decoded);
        assert!(decoded.requests_tools());
    }

    #[test]
    fn plain_messages_omit_tool_fields_in_json() {
        let encoded = serde_json::to_string(&Message::user("hi")).expect("serialize");
        assert!(!encoded.contains("tool_calls"));
        assert!(!encoded.contains("tool_call_id"));
    }

    #[test]
    fn legacy_json_without_tool_fields_still_parses() {
        let decoded: Message =
            serde_json::from_str(r#"{"role":"assistant","content":"done"}"#).expect("deserialize");
        assert_eq!(decoded, Message::assistant("done"));
        assert!(!decoded.requests_tools());
    }

    #[test]
    fn fresh_tool_calls_get_distinct_ids() {
        let a = ToolCall::new("t", json!({}));
        let b = ToolCall::new("t", json!({}));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn final_answers_do_not_request_tools() {
        assert!(!Message::assistant("done").requests_tools());
        // A user message never requests tools even if the field is populated.
        let mut odd = Message::user("hi");
        odd.tool_calls.push(ToolCall::new("t", json!({})));
        assert!(!odd.requests_tools());
    }
}
