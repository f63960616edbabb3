//! Model endpoint configuration.
//!
//! Values come from the `model:` section of the config file, with the
//! conventional `MODEL`, `BASE_URL` and `OPENAI_API_KEY` environment
//! variables filling in anything the file leaves unset.

use serde::Deserialize;

use super::errors::InferenceError;

/// Default endpoint when neither file nor environment names one.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// The model endpoint the agent talks to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Model identifier sent in every request (e.g., "gpt-4o-mini").
    pub name: Option<String>,
    /// Base URL of an OpenAI-compatible API, without `/chat/completions`.
    pub base_url: Option<String>,
    /// Bearer token. Never logged.
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: None,
            base_url: None,
            api_key: None,
            temperature: None,
            max_tokens: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ModelConfig {
    /// Fill unset fields from the environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Fill unset fields from a variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if self.name.is_none() {
            self.name = non_empty("MODEL");
        }
        if self.base_url.is_none() {
            self.base_url = non_empty("BASE_URL");
        }
        if self.api_key.is_none() {
            self.api_key = non_empty("OPENAI_API_KEY");
        }
    }

    /// Effective base URL with any trailing slash removed.
    pub fn endpoint_base(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    /// Model identifier, or a config error if none was given.
    pub fn model_name(&self) -> Result<&str, InferenceError> {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| InferenceError::ConfigError {
                reason: "no model configured (set MODEL or model.name)".into(),
            })
    }

    /// Check the fields needed before the first request.
    pub fn validate(&self) -> Result<(), InferenceError> {
        self.model_name()?;
        if self.request_timeout_secs == 0 {
            return Err(InferenceError::ConfigError {
                reason: "model.request_timeout_secs must be greater than 0".into(),
            });
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(InferenceError::ConfigError {
                    reason: format!("model.temperature {t} is outside 0.0..=2.0"),
                });
            }
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
