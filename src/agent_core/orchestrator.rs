//! Orchestrator: owns the servers, the merged catalog and the history.
//!
//! Lifecycle:
//! 1. **Start**: every configured server is started in order; any failure
//!    stops the ones already running and aborts
//! 2. **Turns**: `run_turn` drives the tool-calling loop against the
//!    catalog snapshot taken at startup
//! 3. **Shutdown**: servers are stopped most-recent-first
//!
//! The orchestrator is the only writer of the conversation history.

use crate::inference::client::ChatModel;
use crate::inference::types::ToolDefinition;
use crate::mcp_client::registry::ToolCatalog;
use crate::mcp_client::{McpClient, McpServersConfig};

use super::agent_loop::{self, TurnContext, TurnOutcome};
use super::conversation::ConversationHistory;
use super::errors::AgentError;
use super::tool_router::{ToolProgress, ToolRouter};
use super::types::AgentSettings;

// ─── Orchestrator ───────────────────────────────────────────────────────────

pub struct Orchestrator {
    mcp_client: McpClient,
    catalog: ToolCatalog,
    /// Catalog in request form, built once.
    tool_definitions: Vec<ToolDefinition>,
    model: Box<dyn ChatModel>,
    history: ConversationHistory,
    router: ToolRouter,
    settings: AgentSettings,
}

impl Orchestrator {
    /// Start every server and build the catalog.
    ///
    /// All-or-nothing: on error no server is left running.
    pub async fn start(
        servers: &McpServersConfig,
        settings: AgentSettings,
        model: Box<dyn ChatModel>,
    ) -> Result<Self, AgentError> {
        settings.validate()?;
        let mut mcp_client = McpClient::start_all(servers).await?;
        mcp_client.set_call_timeout(settings.tool_call_timeout_secs * 1000);
        Ok(Self::from_parts(mcp_client, settings, model))
    }

    /// Assemble an orchestrator around an already-populated client.
    pub fn from_parts(
        mcp_client: McpClient,
        settings: AgentSettings,
        model: Box<dyn ChatModel>,
    ) -> Self {
        let catalog = mcp_client.catalog();
        let tool_definitions = catalog.descriptors().map(ToolDefinition::from).collect();

        tracing::info!(
            servers = mcp_client.running_server_count(),
            tools = catalog.len(),
            dropped = catalog.dropped().len(),
            model = model.model_name(),
            "orchestrator ready"
        );

        Self {
            mcp_client,
            catalog,
            tool_definitions,
            model,
            history: ConversationHistory::new(settings.history_limit),
            router: ToolRouter::new(settings.parallel_tool_calls),
            settings,
        }
    }

    // ─── Turns ──────────────────────────────────────────────────────────

    /// Run one user turn and return the assistant's final text.
    ///
    /// A failed turn is rolled back so the next turn starts from a clean
    /// history. The history is trimmed to its cap after every turn.
    pub async fn run_turn(
        &mut self,
        user_text: &str,
        progress: Option<ToolProgress<'_>>,
    ) -> Result<TurnOutcome, AgentError> {
        let mark = self.history.len();
        let ctx = TurnContext {
            model: self.model.as_ref(),
            mcp_client: &self.mcp_client,
            router: self.router,
            tools: &self.tool_definitions,
            max_tool_rounds: self.settings.max_tool_rounds,
            progress,
        };

        let result = agent_loop::run_turn(&ctx, &mut self.history, user_text).await;
        if let Err(ref e) = result {
            tracing::warn!(error = %e, "turn failed, discarding partial turn");
            self.history.truncate(mark);
        }
        self.history.trim();
        result
    }

    // ─── Shutdown ───────────────────────────────────────────────────────

    /// Stop every server, most recently started first.
    pub async fn shutdown(&mut self) {
        self.mcp_client.shutdown_all().await;
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn server_names(&self) -> Vec<&str> {
        self.mcp_client.server_names()
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::agent_core::agent_loop::test_support::*;
    use crate::agent_core::types::ConversationMessage;
    use crate::inference::types::Role;
    use crate::mcp_client::client::test_support::*;
    use crate::mcp_client::types::ServerEntry;

    /// Shares one scripted model between the orchestrator and the test.
    struct SharedModel(Arc<ScriptedModel>);

    #[async_trait::async_trait]
    impl ChatModel for SharedModel {
        async fn complete(
            &self,
            messages: &[crate::inference::types::ChatMessage],
            tools: &[ToolDefinition],
        ) -> Result<crate::inference::types::ModelResponse, crate::inference::InferenceError> {
            self.0.complete(messages, tools).await
        }

        fn model_name(&self) -> &str {
            self.0.model_name()
        }
    }

    fn orchestrator(
        providers: Vec<FakeProvider>,
        model: ScriptedModel,
        settings: AgentSettings,
    ) -> (Orchestrator, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        let orch = Orchestrator::from_parts(
            client_with(providers),
            settings,
            Box::new(SharedModel(model.clone())),
        );
        (orch, model)
    }

    fn list_provider(name: &str) -> FakeProvider {
        FakeProvider::new(name).tool("list", "List things", serde_json::json!({}), |_| {
            Ok("[]".into())
        })
    }

    #[tokio::test]
    async fn test_calc_add_end_to_end() {
        let (mut orch, model) = orchestrator(
            vec![calc_provider()],
            ScriptedModel::new(vec![
                tool_calls(&[("call_42", "calc_add", r#"{"a":2,"b":3}"#)]),
                text("2 + 3 = 5"),
            ]),
            AgentSettings::default(),
        );

        let outcome = orch.run_turn("what is 2+3?", None).await.unwrap();
        assert_eq!(outcome.text, "2 + 3 = 5");

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);

        // Catalog is sent on every round
        assert_eq!(requests[0].1.len(), 1);
        assert_eq!(requests[0].1[0].function.name, "calc_add");

        let followup = &requests[1].0;
        let tool_msg = followup
            .iter()
            .find(|m| m.role == Role::Tool)
            .expect("tool result in follow-up");
        assert_eq!(tool_msg.content.as_deref(), Some("5"));
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_42"));

        let request_msg = &followup[1];
        let calls = request_msg.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id, "call_42");
        assert_eq!(calls[0].function.arguments, r#"{"a":2,"b":3}"#);
    }

    #[tokio::test]
    async fn test_same_tool_name_on_two_servers() {
        let (orch, _) = orchestrator(
            vec![list_provider("fileserver"), list_provider("dbserver")],
            ScriptedModel::new(vec![]),
            AgentSettings::default(),
        );
        assert_eq!(orch.catalog().names(), vec!["fileserver_list", "dbserver_list"]);
        assert_eq!(orch.server_names(), vec!["fileserver", "dbserver"]);
    }

    #[tokio::test]
    async fn test_unknown_server_is_recoverable() {
        let (mut orch, model) = orchestrator(
            vec![list_provider("fileserver")],
            ScriptedModel::new(vec![
                tool_calls(&[("c1", "unknownserver_list", "{}")]),
                text("That tool does not exist."),
                text("still here"),
            ]),
            AgentSettings::default(),
        );

        let outcome = orch.run_turn("list everything", None).await.unwrap();
        assert_eq!(outcome.text, "That tool does not exist.");

        let routing_result = orch
            .history()
            .messages()
            .iter()
            .find_map(|m| match m {
                ConversationMessage::ToolResult { content, .. } => Some(content.clone()),
                _ => None,
            })
            .unwrap();
        assert!(routing_result.contains("unknown provider 'unknownserver'"));

        // The loop keeps going
        let next = orch.run_turn("ok", None).await.unwrap();
        assert_eq!(next.text, "still here");
        assert_eq!(model.request_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_turn_is_rolled_back() {
        let (mut orch, _) = orchestrator(
            vec![calc_provider()],
            ScriptedModel::forever(tool_calls(&[("c", "calc_add", r#"{"a":1,"b":1}"#)])),
            AgentSettings {
                max_tool_rounds: 2,
                ..Default::default()
            },
        );

        let err = orch.run_turn("loop", None).await.unwrap_err();
        assert!(matches!(err, AgentError::TurnExhausted { rounds: 2 }));
        assert!(orch.history().is_empty());
    }

    #[tokio::test]
    async fn test_history_capped_between_turns() {
        let replies: Vec<_> = (0..15).map(|i| text(&format!("a{i}"))).collect();
        let (mut orch, _) = orchestrator(
            vec![calc_provider()],
            ScriptedModel::new(replies),
            AgentSettings::default(),
        );

        for i in 0..15 {
            orch.run_turn(&format!("q{i}"), None).await.unwrap();
        }
        assert_eq!(orch.history().len(), 20);
        assert!(orch.history().messages()[0].is_user());
    }

    #[tokio::test]
    async fn test_shutdown_stops_all_servers() {
        let (mut orch, _) = orchestrator(
            vec![calc_provider(), list_provider("fileserver")],
            ScriptedModel::new(vec![]),
            AgentSettings::default(),
        );
        orch.shutdown().await;
        assert!(orch.server_names().is_empty());
    }

    #[tokio::test]
    async fn test_start_rejects_unsupported_kind() {
        let servers = McpServersConfig {
            servers: vec![ServerEntry::new("calc", "calc.rb")],
        };
        let err = Orchestrator::start(
            &servers,
            AgentSettings::default(),
            Box::new(ScriptedModel::new(vec![])),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, AgentError::Startup(_)));
    }
}
