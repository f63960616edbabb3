//! Application configuration loading and validation.
//!
//! Precedence, highest first: command-line flags, the YAML config file,
//! environment variables (including a `.env` file), built-in defaults.
//!
//! ```yaml
//! model:
//!   name: ${MODEL:-gpt-4o-mini}
//!   base_url: https://api.openai.com/v1
//! servers:
//!   fileserver: ./servers/files.js
//!   dbserver: ./servers/db.py
//! agent:
//!   max_tool_rounds: 10
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::agent_core::types::AgentSettings;
use crate::inference::config::ModelConfig;
use crate::mcp_client::launch;
use crate::mcp_client::types::{McpServersConfig, ServerEntry};

// ─── Constants ──────────────────────────────────────────────────────────────

/// File name searched for from the working directory upward.
pub const CONFIG_FILE_NAME: &str = "mcpbridge.yaml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "MCPBRIDGE_CONFIG";

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

// ─── Public Types ───────────────────────────────────────────────────────────

/// Everything the binary needs to start.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub servers: McpServersConfig,
    pub agent: AgentSettings,
    /// File the values were read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    /// `--server name=path`, in order.
    pub servers: Vec<ServerEntry>,
    /// Bare script paths; names derive from the file stem.
    pub scripts: Vec<PathBuf>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_rounds: Option<usize>,
    pub parallel_tools: bool,
}

// ─── Loading ────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Build the effective configuration and validate it.
    ///
    /// Validation covers the server table too, so a bad entry is reported
    /// before any server process is started.
    pub fn load(cli: &CliOverrides) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let path = match &cli.config_path {
            Some(p) => Some(p.clone()),
            None => std::env::var(CONFIG_ENV_VAR)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .or_else(|| find_config_path(&cwd)),
        };

        let mut config = match path {
            Some(p) => load_config_file(&p)?,
            None => AppConfig::default(),
        };

        config.model.apply_env();
        config.apply_cli(cli);
        config.validate()?;

        tracing::info!(
            source = %config
                .source
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<none>".into()),
            servers = ?config.servers.names(),
            model = config.model.name.as_deref().unwrap_or(""),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Layer command-line values over the file and environment.
    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        for entry in &cli.servers {
            self.servers.upsert(entry.clone());
        }
        for script in &cli.scripts {
            let name = launch::server_name_from_path(script);
            self.servers.upsert(ServerEntry::new(name, script.clone()));
        }
        if let Some(model) = &cli.model {
            self.model.name = Some(model.clone());
        }
        if let Some(base_url) = &cli.base_url {
            self.model.base_url = Some(base_url.clone());
        }
        if let Some(rounds) = cli.max_rounds {
            self.agent.max_tool_rounds = rounds;
        }
        if cli.parallel_tools {
            self.agent.parallel_tool_calls = true;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid { reason };

        if self.servers.is_empty() {
            return Err(invalid(format!(
                "no servers configured (add a `servers:` table to {CONFIG_FILE_NAME}, \
                 pass --server name=path, or give a script path)"
            )));
        }
        launch::resolve_all(&self.servers).map_err(|e| invalid(e.to_string()))?;
        self.agent.validate().map_err(|e| invalid(e.to_string()))?;
        self.model.validate().map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }
}

/// Search upward from `start` for [`CONFIG_FILE_NAME`].
pub fn find_config_path(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Read, interpolate and parse one config file.
///
/// Relative server paths are resolved against the file's directory.
pub fn load_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let interpolated = interpolate_env_vars(&raw);

    let mut config: AppConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if let Some(base) = path.parent() {
        for entry in &mut config.servers.servers {
            let expanded = PathBuf::from(expand_tilde(&entry.path.to_string_lossy()));
            entry.path = if expanded.is_relative() {
                base.join(expanded)
            } else {
                expanded
            };
        }
    }
    config.source = Some(path.to_path_buf());
    Ok(config)
}

/// Parse a `--server name=path` argument.
pub fn parse_server_arg(arg: &str) -> Result<ServerEntry, String> {
    let (name, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got '{arg}'"))?;
    let name = name.trim();
    let path = path.trim();
    if name.is_empty() || path.is_empty() {
        return Err(format!("expected NAME=PATH, got '{arg}'"));
    }
    Ok(ServerEntry::new(name, path))
}

// ─── Env-var interpolation ──────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((var_name, default)) => std::env::var(var_name)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
model:
  name: gpt-4o-mini
  base_url: http://localhost:8000/v1
servers:
  fileserver: servers/files.js
  dbserver: /opt/db.py
agent:
  max_tool_rounds: 4
"#;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), SAMPLE);

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.model.name.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.servers.names(), vec!["fileserver", "dbserver"]);
        assert_eq!(config.servers.servers[0].path, dir.path().join("servers/files.js"));
        assert_eq!(config.servers.servers[1].path, PathBuf::from("/opt/db.py"));
        assert_eq!(config.agent.max_tool_rounds, 4);
        assert_eq!(config.agent.history_limit, 20);
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_server_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "model:\n  name: m\nservers:\n  calc: a.py\n  calc: b.py\n",
        );
        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "modle:\n  name: m\n");
        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = load_config_file(Path::new("/nonexistent/mcpbridge.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_find_config_path_walks_upward() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), SAMPLE);
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config_path(&nested), Some(path));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config = AppConfig {
            servers: McpServersConfig {
                servers: vec![ServerEntry::new("calc", "calc.py")],
            },
            ..Default::default()
        };
        config.apply_cli(&CliOverrides {
            servers: vec![ServerEntry::new("calc", "calc2.py")],
            scripts: vec![PathBuf::from("tools/weather_server.js")],
            model: Some("gpt-4o".into()),
            max_rounds: Some(3),
            parallel_tools: true,
            ..Default::default()
        });

        assert_eq!(config.servers.names(), vec!["calc", "weather-server"]);
        assert_eq!(config.servers.servers[0].path, PathBuf::from("calc2.py"));
        assert_eq!(config.model.name.as_deref(), Some("gpt-4o"));
        assert_eq!(config.agent.max_tool_rounds, 3);
        assert!(config.agent.parallel_tool_calls);
    }

    #[test]
    fn test_validate_rejects_before_start() {
        let mut config = AppConfig::default();
        config.model.name = Some("gpt-4o".into());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        config.servers.upsert(ServerEntry::new("calc", "calc.exe"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unsupported server kind"));

        config.servers = McpServersConfig {
            servers: vec![ServerEntry::new("my_calc", "calc.py")],
        };
        assert!(config.validate().is_err());

        config.servers = McpServersConfig {
            servers: vec![ServerEntry::new("calc", "calc.py")],
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_server_arg() {
        assert_eq!(
            parse_server_arg("calc=./calc.py").unwrap(),
            ServerEntry::new("calc", "./calc.py")
        );
        assert!(parse_server_arg("calc").is_err());
        assert!(parse_server_arg("=calc.py").is_err());
    }

    #[test]
    fn test_interpolate_env_vars_with_default() {
        std::env::remove_var("__MCPBRIDGE_TEST_UNSET__");
        let result = interpolate_env_vars("name: ${__MCPBRIDGE_TEST_UNSET__:-gpt-4o-mini}");
        assert_eq!(result, "name: gpt-4o-mini");
    }

    #[test]
    fn test_interpolate_env_vars_with_value() {
        std::env::set_var("__MCPBRIDGE_TEST_MODEL__", "local-llama");
        let result = interpolate_env_vars("${__MCPBRIDGE_TEST_MODEL__:-fallback}");
        assert_eq!(result, "local-llama");
        std::env::remove_var("__MCPBRIDGE_TEST_MODEL__");
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain text with $dollar but no braces";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_expand_tilde() {
        let result = expand_tilde("~/servers/db.py");
        assert!(!result.starts_with('~'), "tilde should be expanded");
        assert!(result.ends_with("/servers/db.py"));
    }
}
