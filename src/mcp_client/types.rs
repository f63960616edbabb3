//! Shared types for the MCP client.
//!
//! JSON-RPC 2.0 message types, MCP protocol structures, and the server
//! configuration table.

use std::fmt;
use std::path::PathBuf;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

// ─── JSON-RPC 2.0 ───────────────────────────────────────────────────────────

/// JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response message (success or error).
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: u64,
    pub result: Option<serde_json::Value>,
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

// ─── MCP Protocol Types ──────────────────────────────────────────────────────

/// Protocol revision sent in the `initialize` request.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// One tool as advertised by `tools/list`.
///
/// Every field is optional: servers are untrusted and the catalog merger
/// decides what to keep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpToolDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "inputSchema")]
    pub input_schema: Option<serde_json::Value>,
}

impl McpToolDefinition {
    /// Lenient conversion from one raw `tools/list` entry.
    ///
    /// Entries that are not objects, or whose fields have the wrong type,
    /// become an empty definition that the merger will drop.
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// `tools/list` result payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<serde_json::Value>,
    #[serde(default, alias = "nextCursor")]
    pub next_cursor: Option<String>,
}

/// `tools/call` result payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<serde_json::Value>,
    #[serde(default, alias = "isError")]
    pub is_error: bool,
}

/// One content fragment of a tool result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentFragment {
    Text {
        text: String,
    },
    Image {
        #[serde(default, alias = "mimeType")]
        mime_type: Option<String>,
    },
    Audio {
        #[serde(default, alias = "mimeType")]
        mime_type: Option<String>,
    },
    Resource {
        #[serde(default)]
        resource: serde_json::Value,
    },
    #[serde(other)]
    Unknown,
}

impl CallToolResult {
    /// Text of the first content fragment, if that fragment is text.
    pub fn first_text(&self) -> Option<String> {
        let first = self.content.first()?.clone();
        match serde_json::from_value::<ContentFragment>(first) {
            Ok(ContentFragment::Text { text }) => Some(text),
            _ => None,
        }
    }
}

/// MCP initialize response payload.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResult {
    #[serde(default, alias = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub capabilities: serde_json::Value,
    #[serde(default, alias = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

/// Server info returned in the initialize response.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// One operator-named tool server: a script launched over stdio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEntry {
    pub name: String,
    pub path: PathBuf,
}

impl ServerEntry {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Ordered `name → script path` table.
///
/// Deserializes from a map and keeps the file's key order, which becomes
/// the registration order of the servers and so the catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct McpServersConfig {
    pub servers: Vec<ServerEntry>,
}

impl McpServersConfig {
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name.as_str()).collect()
    }

    /// Append an entry, replacing the path of an existing entry with the same name.
    pub fn upsert(&mut self, entry: ServerEntry) {
        match self.servers.iter_mut().find(|s| s.name == entry.name) {
            Some(existing) => existing.path = entry.path,
            None => self.servers.push(entry),
        }
    }
}

impl<'de> Deserialize<'de> for McpServersConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedServers;

        impl<'de> Visitor<'de> for OrderedServers {
            type Value = McpServersConfig;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of server name to script path")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut servers: Vec<ServerEntry> = Vec::new();
                while let Some((name, path)) = map.next_entry::<String, PathBuf>()? {
                    if servers.iter().any(|s| s.name == name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate server name '{name}'"
                        )));
                    }
                    servers.push(ServerEntry { name, path });
                }
                Ok(McpServersConfig { servers })
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(McpServersConfig::default())
            }
        }

        deserializer.deserialize_any(OrderedServers)
    }
}

// ─── Standard MCP Error Codes ────────────────────────────────────────────────

/// Well-known JSON-RPC error codes.
pub mod error_codes {
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
}

// ─── Tests ───────────────────────────────────────────────────────────────────
