//! The model → tools → model turn loop.
//!
//! A turn starts with user input already appended to the history and runs
//! the model until it produces a final answer. Every intermediate step is
//! appended to the history in order: the assistant's tool request, then one
//! tool-result message per requested call (in request order), then the next
//! model invocation sees all of it.

use futures_util::future::join_all;
use tracing::{debug, instrument};

use crate::errors::AgentError;
use crate::message::Message;
use crate::tools::ToolRegistry;

use super::model::{ChatModel, ModelOutcome};

/// Where the loop stands between steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TurnState {
    /// History ends with user input or tool results; invoke the model next.
    AwaitingModel,
    /// History ends with an unanswered tool request; run the tools next.
    AwaitingTools,
    /// The model produced a final answer.
    Done,
}

/// Runs one full turn, mutating `history` in place.
///
/// Returns the final answer text. The history ends with the assistant
/// message carrying that same text. Exceeding `max_tool_rounds` (when set)
/// aborts with [`AgentError::ToolRoundLimit`]; `None` means unbounded.
#[instrument(skip_all, fields(history_len = history.len()))]
pub async fn run_turn(
    model: &dyn ChatModel,
    tools: &ToolRegistry,
    history: &mut Vec<Message>,
    max_tool_rounds: Option<usize>,
) -> Result<String, AgentError> {
    let mut state = TurnState::AwaitingModel;
    let mut pending = Vec::new();
    let mut rounds = 0usize;
    let mut answer = String::new();

    while state != TurnState::Done {
        match state {
            TurnState::AwaitingModel => match model.complete(history).await? {
                ModelOutcome::FinalAnswer(text) => {
                    history.push(Message::assistant(&text));
                    answer = text;
                    state = TurnState::Done;
                }
                ModelOutcome::ToolRequest(calls) => {
                    history.push(Message::assistant_tool_request(calls.clone()));
                    pending = calls;
                    state = TurnState::AwaitingTools;
                }
            },
            TurnState::AwaitingTools => {
                rounds += 1;
                if let Some(limit) = max_tool_rounds {
                    if rounds > limit {
                        return Err(AgentError::ToolRoundLimit { limit });
                    }
                }
                debug!(round = rounds, calls = pending.len(), "dispatching tools");
                // Calls run concurrently; results are appended in request
                // order so replays are deterministic.
                let calls = std::mem::take(&mut pending);
                let results = join_all(calls.iter().map(|call| tools.dispatch(call))).await;
                for (call, content) in calls.iter().zip(results) {
                    history.push(Message::tool(&call.id, &content));
                }
                state = TurnState::AwaitingModel;
            }
            TurnState::Done => unreachable!(),
        }
    }
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::message::ToolCall;
    use crate::tools::{Tool, ToolError};

    use super::*;

    /// Scripted model: pops the next outcome on each invocation.
    struct ScriptedModel {
        script: std::sync::Mutex<Vec<ModelOutcome>>,
    }

    impl ScriptedModel {
        fn new(outcomes: Vec<ModelOutcome>) -> Self {
            let mut script = outcomes;
            script.reverse();
            Self {
                script: std::sync::Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, _: &[Message]) -> Result<ModelOutcome, AgentError> {
            self.script
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| AgentError::ModelInvocation("script exhausted".to_string()))
        }
    }

    struct CountingTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "lookup"
        }

        fn description(&self) -> &str {
            "counts invocations"
        }

        async fn call(
            &self,
            arguments: serde_json::Value,
        ) -> Result<serde_json::Value, ToolError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"invocation": n, "args": arguments}))
        }
    }

    fn registry(calls: Arc<AtomicUsize>) -> ToolRegistry {
        ToolRegistry::new().with_tool(Arc::new(CountingTool { calls }))
    }

    #[tokio::test]
    async fn direct_answer_needs_no_tools() {
        let model = ScriptedModel::new(vec![ModelOutcome::FinalAnswer("42".to_string())]);
        let tools = ToolRegistry::new();
        let mut history = vec![Message::user("what is the answer?")];
        let answer = run_turn(&model, &tools, &mut history, Some(12)).await.unwrap();
        assert_eq!(answer, "42");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], Message::assistant("42"));
    }

    #[tokio::test]
    async fn tool_round_appends_request_then_results_in_order() {
        let call_a = ToolCall::with_id("c1", "lookup", json!({"q": "a"}));
        let call_b = ToolCall::with_id("c2", "lookup", json!({"q": "b"}));
        let model = ScriptedModel::new(vec![
            ModelOutcome::ToolRequest(vec![call_a, call_b]),
            ModelOutcome::FinalAnswer("done".to_string()),
        ]);
        let calls = Arc::new(AtomicUsize::new(0));
        let tools = registry(calls.clone());
        let mut history = vec![Message::user("go")];

        let answer = run_turn(&model, &tools, &mut history, Some(12)).await.unwrap();
        assert_eq!(answer, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // user, tool request, two results, final answer.
        assert_eq!(history.len(), 5);
        assert!(history[1].requests_tools());
        assert_eq!(history[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(history[3].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(history[4], Message::assistant("done"));
    }

    #[tokio::test]
    async fn unknown_tool_feeds_an_error_back_to_the_model() {
        let call = ToolCall::with_id("c1", "no_such_tool", json!({}));
        let model = ScriptedModel::new(vec![
            ModelOutcome::ToolRequest(vec![call]),
            ModelOutcome::FinalAnswer("recovered".to_string()),
        ]);
        let tools = ToolRegistry::new();
        let mut history = vec![Message::user("go")];

        let answer = run_turn(&model, &tools, &mut history, Some(12)).await.unwrap();
        assert_eq!(answer, "recovered");
        assert!(history[2].content.contains("unknown tool"));
    }

    #[tokio::test]
    async fn round_limit_aborts_a_looping_model() {
        let outcomes: Vec<ModelOutcome> = (0..5)
            .map(|i| {
                ModelOutcome::ToolRequest(vec![ToolCall::with_id(
                    format!("c{i}"),
                    "lookup",
                    json!({}),
                )])
            })
            .collect();
        let model = ScriptedModel::new(outcomes);
        let tools = registry(Arc::new(AtomicUsize::new(0)));
        let mut history = vec![Message::user("loop forever")];

        let err = run_turn(&model, &tools, &mut history, Some(2))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolRoundLimit { limit: 2 }));
    }

    #[tokio::test]
    async fn unbounded_rounds_run_until_the_model_answers() {
        let mut outcomes: Vec<ModelOutcome> = (0..20)
            .map(|i| {
                ModelOutcome::ToolRequest(vec![ToolCall::with_id(
                    format!("c{i}"),
                    "lookup",
                    json!({}),
                )])
            })
            .collect();
        outcomes.push(ModelOutcome::FinalAnswer("finally".to_string()));
        let model = ScriptedModel::new(outcomes);
        let tools = registry(Arc::new(AtomicUsize::new(0)));
        let mut history = vec![Message::user("go")];

        let answer = run_turn(&model, &tools, &mut history, None).await.unwrap();
        assert_eq!(answer, "finally");
    }

    #[tokio::test]
    async fn model_error_propagates() {
        let model = ScriptedModel::new(vec![]);
        let tools = ToolRegistry::new();
        let mut history = vec![Message::user("go")];
        let err = run_turn(&model, &tools, &mut history, Some(12))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ModelInvocation(_)));
    }
}
