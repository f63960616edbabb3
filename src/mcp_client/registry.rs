//! Tool catalog: merges tool lists across all MCP servers.
//!
//! Provides:
//! - Qualified names (`server_tool`) that split back unambiguously
//! - Normalized, model-facing descriptors with every schema key filled in
//! - Deterministic ordering: servers in registration order, tools in
//!   discovery order
//! - Accounting of entries dropped for missing fields

use serde::Serialize;

use super::launch::QUALIFIED_NAME_SEPARATOR;
use super::types::McpToolDefinition;

// ─── Qualified Names ─────────────────────────────────────────────────────────

/// Build the globally unique name for a server's tool.
pub fn qualify(server_name: &str, tool_name: &str) -> String {
    format!("{server_name}{QUALIFIED_NAME_SEPARATOR}{tool_name}")
}

/// Split a qualified name at the first separator.
///
/// Returns `None` when there is no separator or either side is empty.
/// Server names never contain the separator, so the leftmost split is
/// the only correct one even when the tool name contains it.
pub fn split_qualified(qualified: &str) -> Option<(&str, &str)> {
    let (server, tool) = qualified.split_once(QUALIFIED_NAME_SEPARATOR)?;
    if server.is_empty() || tool.is_empty() {
        return None;
    }
    Some((server, tool))
}

// ─── Normalized Descriptors ──────────────────────────────────────────────────

/// `parameters` object of a model-facing tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedParameters {
    /// Defaults to `"object"`.
    #[serde(rename = "type")]
    pub schema_type: serde_json::Value,
    /// Defaults to `{}`.
    pub properties: serde_json::Value,
    /// Defaults to `[]`.
    pub required: serde_json::Value,
}

impl NormalizedParameters {
    /// Fill the three keys from a tool's input schema.
    ///
    /// | schema                 | type       | properties | required |
    /// |------------------------|------------|------------|----------|
    /// | absent / not an object | `"object"` | `{}`       | `[]`     |
    /// | key absent or `null`   | `"object"` | `{}`       | `[]`     |
    /// | key present            | as given   | as given   | as given |
    pub fn from_schema(schema: Option<&serde_json::Value>) -> Self {
        let obj = schema.and_then(|s| s.as_object());
        let field = |key: &str, default: serde_json::Value| {
            obj.and_then(|o| o.get(key))
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or(default)
        };

        Self {
            schema_type: field("type", serde_json::Value::String("object".into())),
            properties: field("properties", serde_json::json!({})),
            required: field("required", serde_json::json!([])),
        }
    }
}

/// Model-facing function signature of one qualified tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: NormalizedParameters,
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// One tool re-exported under its qualified name.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub server: String,
    pub local_name: String,
    pub descriptor: NormalizedToolDescriptor,
}

impl CatalogEntry {
    pub fn qualified_name(&self) -> &str {
        &self.descriptor.name
    }
}

/// A tool entry skipped during merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedTool {
    pub server: String,
    pub name: Option<String>,
    pub reason: &'static str,
}

/// Merged catalog across all servers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCatalog {
    entries: Vec<CatalogEntry>,
    dropped: Vec<DroppedTool>,
}

impl ToolCatalog {
    /// Merge per-server tool lists into one catalog.
    ///
    /// Input order is preserved. Entries without a name or a description,
    /// and repeated names within a server, are skipped and recorded in
    /// [`dropped`](Self::dropped) rather than failing the merge.
    pub fn merge(servers: &[(String, Vec<McpToolDefinition>)]) -> Self {
        let mut catalog = ToolCatalog::default();

        for (server, tools) in servers {
            for tool in tools {
                catalog.push(server, tool);
            }
        }

        if !catalog.dropped.is_empty() {
            tracing::warn!(
                dropped = catalog.dropped.len(),
                kept = catalog.entries.len(),
                "skipped malformed tool entries during catalog merge"
            );
        }
        tracing::info!(
            tool_count = catalog.entries.len(),
            server_count = servers.len(),
            "merged tool catalog"
        );

        catalog
    }

    fn push(&mut self, server: &str, tool: &McpToolDefinition) {
        // Kept verbatim: the server is invoked with exactly the name it advertised
        let name = tool.name.as_deref().filter(|n| !n.trim().is_empty());
        let Some(name) = name else {
            self.drop_entry(server, None, "missing name");
            return;
        };
        let Some(description) = tool.description.as_ref() else {
            self.drop_entry(server, Some(name), "missing description");
            return;
        };

        let qualified = qualify(server, name);
        if self.get(&qualified).is_some() {
            self.drop_entry(server, Some(name), "duplicate tool name");
            return;
        }

        self.entries.push(CatalogEntry {
            server: server.to_string(),
            local_name: name.to_string(),
            descriptor: NormalizedToolDescriptor {
                name: qualified,
                description: description.clone(),
                parameters: NormalizedParameters::from_schema(tool.input_schema.as_ref()),
            },
        });
    }

    fn drop_entry(&mut self, server: &str, name: Option<&str>, reason: &'static str) {
        tracing::debug!(server, tool = ?name, reason, "dropping tool entry");
        self.dropped.push(DroppedTool {
            server: server.to_string(),
            name: name.map(str::to_string),
            reason,
        });
    }

    /// Look up an entry by qualified name.
    pub fn get(&self, qualified: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.qualified_name() == qualified)
    }

    /// All entries in catalog order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Descriptors in catalog order.
    pub fn descriptors(&self) -> impl Iterator<Item = &NormalizedToolDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Qualified names in catalog order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.qualified_name()).collect()
    }

    /// Entries skipped during the merge.
    pub fn dropped(&self) -> &[DroppedTool] {
        &self.dropped
    }

    /// Count tools belonging to a specific server.
    pub fn tools_for_server(&self, server_name: &str) -> usize {
        self.entries.iter().filter(|e| e.server == server_name).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
