//! Inference Client: OpenAI-compatible chat completions.
//!
//! This module handles all communication with the model endpoint:
//! - Request/response types for the Chat Completions API
//! - Non-streaming completion with Bearer authentication
//! - Response validation and tool call extraction
//! - Endpoint configuration from file and environment
//!
//! The agent loop depends only on the [`ChatModel`] trait, so the endpoint
//! is interchangeable via config and replaceable by a fake in tests.

pub mod client;
pub mod config;
pub mod errors;
pub mod response;
pub mod types;

// Re-exports for convenience
pub use client::{ChatModel, InferenceClient};
pub use config::ModelConfig;
pub use errors::InferenceError;
pub use types::{ChatMessage, ModelResponse, Role, ToolCallResponse, ToolDefinition};
