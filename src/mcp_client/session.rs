//! MCP protocol operations over one transport.
//!
//! `McpSession` speaks the three requests the bridge needs: the
//! `initialize` handshake, paginated `tools/list`, and `tools/call`.
//! It knows nothing about processes; `lifecycle` owns the child.

use super::errors::McpError;
use super::transport::{extract_result, StdioTransport};
use super::types::{
    CallToolResult, InitializeResult, ListToolsResult, McpToolDefinition, PROTOCOL_VERSION,
};

/// Returned when a tool produced no text output.
pub const NO_OUTPUT: &str = "no output produced";

/// Upper bound on `tools/list` pages, guarding against a server that
/// keeps returning the same cursor.
const MAX_LIST_PAGES: usize = 64;

/// An initialized MCP session.
pub struct McpSession {
    transport: StdioTransport,
}

impl McpSession {
    /// Perform the handshake on a fresh transport.
    ///
    /// Sends `initialize`, then the `notifications/initialized`
    /// notification the protocol requires before any other request.
    pub async fn initialize(transport: StdioTransport) -> Result<Self, McpError> {
        let name = transport.server_name().to_string();
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        });

        let response = transport.request("initialize", Some(params)).await?;
        let result = extract_result(response).map_err(|e| McpError::InitFailed {
            name: name.clone(),
            reason: e.to_string(),
        })?;

        let init: InitializeResult =
            serde_json::from_value(result).map_err(|e| McpError::InitFailed {
                name: name.clone(),
                reason: format!("failed to parse initialize response: {e}"),
            })?;

        transport.notify("notifications/initialized", None).await?;

        tracing::info!(
            server = %name,
            protocol = init.protocol_version.as_deref().unwrap_or("unknown"),
            server_name = init.server_info.as_ref().and_then(|i| i.name.as_deref()).unwrap_or("unknown"),
            "MCP session initialized"
        );

        Ok(Self { transport })
    }

    /// The operator-chosen name of this session's server.
    pub fn server_name(&self) -> &str {
        self.transport.server_name()
    }

    /// Query the server's full tool list, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDefinition>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor
                .as_ref()
                .map(|c| serde_json::json!({ "cursor": c }));
            let response = self.transport.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(extract_result(response)?)
                .map_err(|e| McpError::TransportError {
                    server: self.server_name().to_string(),
                    reason: format!("malformed tools/list result: {e}"),
                })?;

            tools.extend(page.tools.into_iter().map(McpToolDefinition::from_value));

            match page.next_cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => return Ok(tools),
            }
        }

        tracing::warn!(
            server = %self.server_name(),
            pages = MAX_LIST_PAGES,
            "tools/list pagination limit reached, using partial list"
        );
        Ok(tools)
    }

    /// Invoke one tool and return its textual result.
    ///
    /// Only the first content fragment is read. Empty content, or a first
    /// fragment that is not text, yields [`NO_OUTPUT`].
    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<String, McpError> {
        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments,
        });

        let response = self.transport.request("tools/call", Some(params)).await?;
        let result: CallToolResult = serde_json::from_value(extract_result(response)?)
            .map_err(|e| McpError::TransportError {
                server: self.server_name().to_string(),
                reason: format!("malformed tools/call result: {e}"),
            })?;

        if result.is_error {
            tracing::warn!(
                server = %self.server_name(),
                tool = tool_name,
                "tool reported an error result"
            );
        }

        Ok(result.first_text().unwrap_or_else(|| NO_OUTPUT.to_string()))
    }

    /// Close the write half of the transport.
    pub async fn close(&self) {
        self.transport.close().await;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
