//! ToolRouter: dispatches model tool calls to MCP servers.
//!
//! The ToolRouter is the bridge between the model's tool call decisions and
//! the running servers. It handles:
//! - Splitting a qualified name back into (server, tool)
//! - Decoding the model's JSON-encoded argument string
//! - Execution via McpClient, sequential or fanned out
//! - Converting every failure into tool-result text for the model

use std::time::Instant;

use futures::future::join_all;

use crate::inference::types::ToolCallResponse;
use crate::mcp_client::registry::split_qualified;
use crate::mcp_client::McpClient;

use super::errors::RoutingError;

/// Observer for each tool call about to be executed: `(qualified name, arguments)`.
pub type ToolProgress<'a> = &'a (dyn Fn(&str, &serde_json::Value) + Send + Sync);

// ─── Routing ────────────────────────────────────────────────────────────────

/// Split a qualified name into `(server, tool)` at the first separator.
pub fn route(qualified: &str) -> Result<(&str, &str), RoutingError> {
    split_qualified(qualified).ok_or_else(|| RoutingError::MalformedName {
        name: qualified.to_string(),
    })
}

/// Decode the model's argument string.
///
/// An empty string means "no arguments". Anything that is not a JSON
/// object is rejected with a message meant for the model.
pub fn decode_arguments(raw: &str) -> Result<serde_json::Value, String> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Null) => Ok(serde_json::json!({})),
        Ok(value @ serde_json::Value::Object(_)) => Ok(value),
        Ok(other) => Err(format!(
            "invalid tool arguments: expected a JSON object, got {other}"
        )),
        Err(e) => Err(format!("invalid tool arguments: {e}")),
    }
}

// ─── ToolRouter ─────────────────────────────────────────────────────────────

/// Result text for one executed call, keyed by its call id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub call_id: String,
    pub content: String,
}

/// Dispatches tool calls from the model to MCP servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolRouter {
    /// Execute the calls of one round concurrently.
    parallel: bool,
}

impl ToolRouter {
    pub fn new(parallel: bool) -> Self {
        Self { parallel }
    }

    // ─── Dispatch ───────────────────────────────────────────────────────

    /// Route and forward one call.
    ///
    /// Routing failures are returned as `Err`. Invocation failures are
    /// already converted to text in `Ok`, since the model sees both the
    /// same way.
    pub async fn dispatch(
        &self,
        mcp_client: &McpClient,
        qualified: &str,
        arguments: serde_json::Value,
    ) -> Result<String, RoutingError> {
        let (server, tool) = route(qualified)?;
        if !mcp_client.is_server_running(server) {
            return Err(RoutingError::UnknownProvider {
                provider: server.to_string(),
                name: qualified.to_string(),
            });
        }

        match mcp_client.call_tool(server, tool, arguments).await {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::warn!(server, tool, error = %e, "tool invocation failed");
                Ok(format!("tool invocation failed: {e}"))
            }
        }
    }

    /// Decode, dispatch and stringify one model tool call.
    async fn execute_one(
        &self,
        mcp_client: &McpClient,
        call: &ToolCallResponse,
        progress: Option<ToolProgress<'_>>,
    ) -> ToolOutcome {
        let start = Instant::now();
        let name = call.function.name.as_str();

        let content = match decode_arguments(&call.function.arguments) {
            Ok(arguments) => {
                if let Some(notify) = progress {
                    notify(name, &arguments);
                }
                match self.dispatch(mcp_client, name, arguments).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(tool = name, error = %e, "tool call could not be routed");
                        format!("routing error: {e}")
                    }
                }
            }
            Err(message) => {
                tracing::warn!(tool = name, raw = %call.function.arguments, "undecodable tool arguments");
                message
            }
        };

        tracing::info!(
            tool = name,
            call_id = %call.id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            result_len = content.len(),
            "tool call executed"
        );

        ToolOutcome {
            call_id: call.id.clone(),
            content,
        }
    }

    /// Execute every call of one round.
    ///
    /// Outcomes are returned in the order the model emitted the calls,
    /// whether execution was sequential or concurrent.
    pub async fn execute_calls(
        &self,
        mcp_client: &McpClient,
        calls: &[ToolCallResponse],
        progress: Option<ToolProgress<'_>>,
    ) -> Vec<ToolOutcome> {
        if self.parallel && calls.len() > 1 {
            return join_all(
                calls
                    .iter()
                    .map(|call| self.execute_one(mcp_client, call, progress)),
            )
            .await;
        }

        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            outcomes.push(self.execute_one(mcp_client, call, progress).await);
        }
        outcomes
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::inference::types::FunctionCallResponse;
    use crate::mcp_client::client::test_support::*;
    use crate::mcp_client::errors::McpError;

    fn call(id: &str, name: &str, args: &str) -> ToolCallResponse {
        ToolCallResponse {
            id: id.into(),
            r#type: "function".into(),
            function: FunctionCallResponse {
                name: name.into(),
                arguments: args.into(),
            },
        }
    }

    #[test]
    fn test_route() {
        assert_eq!(route("calc_add").unwrap(), ("calc", "add"));
        assert_eq!(route("fs_list_dir").unwrap(), ("fs", "list_dir"));
        assert!(matches!(
            route("add"),
            Err(RoutingError::MalformedName { .. })
        ));
    }

    #[test]
    fn test_decode_arguments() {
        assert_eq!(decode_arguments("").unwrap(), serde_json::json!({}));
        assert_eq!(decode_arguments("null").unwrap(), serde_json::json!({}));
        assert_eq!(
            decode_arguments(r#"{"a":2,"b":3}"#).unwrap(),
            serde_json::json!({"a": 2, "b": 3})
        );
        assert!(decode_arguments("{not json").unwrap_err().starts_with("invalid tool arguments:"));
        assert!(decode_arguments("[1,2]").is_err());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_provider() {
        let client = client_with(vec![calc_provider()]);
        let err = ToolRouter::default()
            .dispatch(&client, "unknownserver_list", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RoutingError::UnknownProvider {
                provider: "unknownserver".into(),
                name: "unknownserver_list".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_dispatch_invocation_error_becomes_text() {
        let failing = FakeProvider::new("db").tool("query", "Run SQL", serde_json::json!({}), |_| {
            Err(McpError::ServerError {
                code: -32000,
                message: "no such table".into(),
                data: None,
            })
        });
        let client = client_with(vec![failing]);
        let out = ToolRouter::default()
            .dispatch(&client, "db_query", serde_json::json!({"sql": "select 1"}))
            .await
            .unwrap();
        assert!(out.starts_with("tool invocation failed:"));
        assert!(out.contains("no such table"));
    }

    #[tokio::test]
    async fn test_execute_calls_never_fails() {
        let client = client_with(vec![calc_provider()]);
        let calls = vec![
            call("c1", "calc_add", r#"{"a":2,"b":3}"#),
            call("c2", "unknownserver_list", "{}"),
            call("c3", "calc_add", "{oops"),
            call("c4", "nosep", "{}"),
        ];
        let outcomes = ToolRouter::default().execute_calls(&client, &calls, None).await;

        let ids: Vec<_> = outcomes.iter().map(|o| o.call_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3", "c4"]);
        assert_eq!(outcomes[0].content, "5");
        assert!(outcomes[1].content.starts_with("routing error: unknown provider"));
        assert!(outcomes[2].content.starts_with("invalid tool arguments:"));
        assert!(outcomes[3].content.starts_with("routing error: malformed tool name"));
    }

    #[tokio::test]
    async fn test_parallel_preserves_call_order() {
        let mut slow = FakeProvider::new("slow").tool("echo", "Echo", serde_json::json!({}), |args| {
            Ok(args["v"].to_string())
        });
        slow.delay = Some(Duration::from_millis(30));
        let fast = FakeProvider::new("fast").tool("echo", "Echo", serde_json::json!({}), |args| {
            Ok(args["v"].to_string())
        });
        let client = client_with(vec![slow, fast]);

        let calls = vec![
            call("c1", "slow_echo", r#"{"v":1}"#),
            call("c2", "fast_echo", r#"{"v":2}"#),
            call("c3", "slow_echo", r#"{"v":3}"#),
        ];
        let outcomes = ToolRouter::new(true).execute_calls(&client, &calls, None).await;
        let pairs: Vec<_> = outcomes
            .iter()
            .map(|o| (o.call_id.as_str(), o.content.as_str()))
            .collect();
        assert_eq!(pairs, vec![("c1", "1"), ("c2", "2"), ("c3", "3")]);
    }

    #[tokio::test]
    async fn test_progress_reports_decoded_arguments() {
        let client = client_with(vec![calc_provider()]);
        let seen = Mutex::new(Vec::new());
        let progress = |name: &str, args: &serde_json::Value| {
            seen.lock().unwrap().push((name.to_string(), args.clone()));
        };
        ToolRouter::default()
            .execute_calls(&client, &[call("c1", "calc_add", r#"{"a":1,"b":1}"#)], Some(&progress))
            .await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("calc_add".to_string(), serde_json::json!({"a": 1, "b": 1}))]
        );
    }
}
