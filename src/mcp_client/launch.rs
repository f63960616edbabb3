//! Server launch resolution: pick the interpreter from the script's kind.
//!
//! Only two kinds are recognized: Python scripts (`.py`) and Node scripts
//! (`.js`). Anything else is rejected before any server is started.

use std::path::Path;

use super::errors::McpError;
use super::types::{McpServersConfig, ServerEntry};

/// Separator between server name and tool name in qualified tool names.
pub const QUALIFIED_NAME_SEPARATOR: char = '_';

// ─── Server Kind ─────────────────────────────────────────────────────────────

/// Runtime a server script needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    Python,
    Node,
}

impl ServerKind {
    /// Infer the kind from a script path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") => Some(ServerKind::Python),
            Some("js") => Some(ServerKind::Node),
            _ => None,
        }
    }

    /// Interpreter command for this kind.
    pub fn command(self) -> &'static str {
        match self {
            ServerKind::Python => default_python_command(),
            ServerKind::Node => "node",
        }
    }
}

// ─── Platform Helpers ────────────────────────────────────────────────────────

/// Platform-correct Python command.
///
/// macOS 12.3+ removed the `python` symlink; only `python3` exists.
/// Windows installs Python as `python.exe` via the official installer.
fn default_python_command() -> &'static str {
    if cfg!(target_os = "windows") {
        "python"
    } else {
        "python3"
    }
}

// ─── Launch Spec ─────────────────────────────────────────────────────────────

/// Fully resolved command line for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub name: String,
    pub kind: ServerKind,
    pub command: String,
    pub args: Vec<String>,
}

/// Resolve the launch command for one configured server.
pub fn resolve_launch(entry: &ServerEntry) -> Result<LaunchSpec, McpError> {
    let kind = ServerKind::from_path(&entry.path).ok_or_else(|| McpError::UnsupportedServerKind {
        name: entry.name.clone(),
        path: entry.path.display().to_string(),
    })?;

    Ok(LaunchSpec {
        name: entry.name.clone(),
        kind,
        command: kind.command().to_string(),
        args: vec![entry.path.to_string_lossy().into_owned()],
    })
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Check that a server name can be used as a qualified-name prefix.
pub fn validate_server_name(name: &str) -> Result<(), McpError> {
    if name.trim().is_empty() {
        return Err(McpError::InvalidServerName {
            name: name.to_string(),
            reason: "name is empty".into(),
        });
    }
    if name.contains(QUALIFIED_NAME_SEPARATOR) {
        return Err(McpError::InvalidServerName {
            name: name.to_string(),
            reason: format!("name must not contain '{QUALIFIED_NAME_SEPARATOR}'"),
        });
    }
    Ok(())
}

/// Validate the whole table and resolve every launch command.
///
/// Runs before any process is spawned, so a bad entry anywhere in the
/// table aborts startup with nothing to clean up.
pub fn resolve_all(config: &McpServersConfig) -> Result<Vec<LaunchSpec>, McpError> {
    if config.is_empty() {
        return Err(McpError::ConfigError {
            reason: "no servers configured".into(),
        });
    }

    let mut specs: Vec<LaunchSpec> = Vec::with_capacity(config.servers.len());
    for entry in &config.servers {
        validate_server_name(&entry.name)?;
        if specs.iter().any(|s| s.name == entry.name) {
            return Err(McpError::DuplicateServer {
                name: entry.name.clone(),
            });
        }
        specs.push(resolve_launch(entry)?);
    }
    Ok(specs)
}

/// Derive a server name from a script path (single-server mode).
///
/// Uses the file stem with separator characters replaced by `-`.
pub fn server_name_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("server")
        .replace(QUALIFIED_NAME_SEPARATOR, "-")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
