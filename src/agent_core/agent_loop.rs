//! The per-turn tool-calling loop.
//!
//! ```text
//! user text ─▶ AwaitingModel ──tool_calls──▶ ExecutingTools ─┐
//!                   │  ▲                                     │
//!                   │  └─────────── results appended ────────┘
//!                   └──other──▶ Done(text)
//! ```
//!
//! Every round sends the full history plus the tool catalog. Tool rounds
//! are bounded; a model that is still asking for tools after the last
//! allowed round ends the turn with `TurnExhausted`.

use crate::inference::client::ChatModel;
use crate::inference::types::{ModelResponse, ToolDefinition};
use crate::mcp_client::McpClient;

use super::conversation::ConversationHistory;
use super::errors::AgentError;
use super::tool_router::{ToolProgress, ToolRouter};
use super::types::ConversationMessage;

/// Where the loop is within a turn.
#[derive(Debug)]
enum LoopState {
    AwaitingModel,
    ExecutingTools(ModelResponse),
    Done(String),
}

/// Everything one turn needs, borrowed from the orchestrator.
pub struct TurnContext<'a> {
    pub model: &'a dyn ChatModel,
    pub mcp_client: &'a McpClient,
    pub router: ToolRouter,
    pub tools: &'a [ToolDefinition],
    pub max_tool_rounds: usize,
    pub progress: Option<ToolProgress<'a>>,
}

/// Result of a completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Final assistant text.
    pub text: String,
    /// Tool rounds executed.
    pub rounds: usize,
    /// Tool calls executed across all rounds.
    pub tool_calls: usize,
}

/// Run one turn: append the user's text and loop until the model answers.
///
/// On success the history holds the user message, each round's tool-call
/// request and results, and the final assistant text. On error the caller
/// decides whether to keep the partial turn.
pub async fn run_turn(
    ctx: &TurnContext<'_>,
    history: &mut ConversationHistory,
    user_text: &str,
) -> Result<TurnOutcome, AgentError> {
    history.push(ConversationMessage::User {
        text: user_text.to_string(),
    });

    let mut state = LoopState::AwaitingModel;
    let mut rounds = 0usize;
    let mut tool_calls = 0usize;

    loop {
        state = match state {
            LoopState::AwaitingModel => {
                tracing::info!(
                    round = rounds,
                    history_len = history.len(),
                    tool_count = ctx.tools.len(),
                    "=== AGENT LOOP ROUND START ==="
                );

                let response = ctx
                    .model
                    .complete(&history.to_chat_messages(), ctx.tools)
                    .await?;

                if response.requests_tools() {
                    if rounds >= ctx.max_tool_rounds {
                        tracing::warn!(rounds, "tool round limit reached, ending turn");
                        return Err(AgentError::TurnExhausted { rounds });
                    }
                    LoopState::ExecutingTools(response)
                } else {
                    if response.finish_reason.as_deref() == Some("tool_calls") {
                        tracing::warn!("model reported tool_calls without any calls, treating as text");
                    }
                    LoopState::Done(response.content.unwrap_or_default())
                }
            }

            LoopState::ExecutingTools(response) => {
                rounds += 1;
                tool_calls += response.tool_calls.len();

                let outcomes = ctx
                    .router
                    .execute_calls(ctx.mcp_client, &response.tool_calls, ctx.progress)
                    .await;

                history.push(ConversationMessage::AssistantToolCalls {
                    content: response.content,
                    calls: response.tool_calls,
                });
                for outcome in outcomes {
                    history.push(ConversationMessage::ToolResult {
                        call_id: outcome.call_id,
                        content: outcome.content,
                    });
                }

                LoopState::AwaitingModel
            }

            LoopState::Done(text) => {
                history.push(ConversationMessage::AssistantText { text: text.clone() });
                tracing::info!(rounds, tool_calls, "turn complete");
                return Ok(TurnOutcome {
                    text,
                    rounds,
                    tool_calls,
                });
            }
        };
    }
}

// ─── Test Support ───────────────────────────────────────────────────────────


// ─── Tests ──────────────────────────────────────────────────────────────────
