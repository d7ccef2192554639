//! Step-bounded agent runtime for Wayfarer.
//!
//! This crate drives a model-backed agent through a bounded number of
//! think/act steps until it reaches a terminal condition, either collecting
//! every step before returning or streaming steps as they complete.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐  step()  ┌──────────────┐ complete() ┌───────────────┐
//! │      Agent       │─────────>│  ReactCycle  │───────────>│ ModelBackend  │
//! │ (run / streaming)│          │ (think, act) │            │  (LlmClient)  │
//! └────────┬─────────┘          └──────┬───────┘            └───────────────┘
//!          │                           │ execute_tool_calls()
//!     RunContext                ┌──────┴───────┐
//!  (state, step, history)       │ ToolExecutor │──> ToolCatalog (weather, pdf, terminate)
//!                               └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`agent`] -- Execution controller, run context, think/act cycle, streaming.
//! - [`llm`] -- Model backend trait, OpenAI-compatible client, and wire types.
//! - [`tools`] -- Tool trait, tool catalog, built-in tools, and the tool-execution backend.
//! - [`config`] -- Settings file, environment overrides, and presets.
//! - [`error`] -- Agent error types.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod tools;

// Re-export the most commonly used types at the crate root.
pub use agent::{
    Action, Agent, AgentConfig, AgentState, AgentStream, ArtifactMarker, CleanupHook, ReactCycle,
    RunContext, RunEvent, StepRecord, StepStrategy, Thought,
};
pub use config::Settings;
pub use error::{AgentError, Result};
pub use llm::{
    AssistantMessage, ChatRequest, LlmClient, LlmClientConfig, LoggingBackend, Message,
    ModelBackend, Role, ToolCall, ToolDefinition,
};
pub use tools::{
    CatalogExecutor, PdfTool, TERMINATE_TOOL_NAME, TerminateTool, Tool, ToolCatalog,
    ToolExecutor, WeatherTool,
};
