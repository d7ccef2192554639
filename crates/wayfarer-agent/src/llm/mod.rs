//! LLM integration layer.
//!
//! - [`types`] -- Core data types (messages, tool calls, requests).
//! - [`backend`] -- The [`ModelBackend`] trait and a logging decorator.
//! - [`client`] -- HTTP client for OpenAI-compatible Chat Completions APIs.

pub mod backend;
pub mod client;
pub mod types;

// Re-export the most commonly used types for convenience.
pub use backend::{LoggingBackend, ModelBackend};
pub use client::{LlmClient, LlmClientConfig};
pub use types::{
    AssistantMessage, ChatRequest, Message, Role, ToolCall, ToolDefinition, last_user_message,
    latest_tool_results,
};
