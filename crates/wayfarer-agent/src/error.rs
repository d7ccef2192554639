//! Agent error types.
//!
//! All agent subsystems surface errors through [`AgentError`].  Each variant
//! carries enough context for callers to decide how to handle the failure.

use crate::agent::AgentState;

/// Unified error type for the agent runtime.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- Precondition errors -------------------------------------------------
    /// A run was requested while the agent was not idle.
    #[error("cannot run agent from state: {state}")]
    InvalidState { state: AgentState },

    /// A caller-supplied argument was rejected (e.g. a blank prompt).
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    // -- LLM errors ----------------------------------------------------------
    /// An HTTP request to the model backend failed.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The model backend response could not be parsed into the expected format.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    // -- Tool errors ---------------------------------------------------------
    /// A tool call referenced by the model does not exist in the catalog.
    #[error("unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    /// A tool invocation failed.
    #[error("tool execution failed for `{tool_name}`: {reason}")]
    ToolExecutionFailed { tool_name: String, reason: String },

    // -- Configuration errors ------------------------------------------------
    /// Configuration validation or loading failed.
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Generic -------------------------------------------------------------
    /// Catch-all for unexpected internal errors.  Prefer a typed variant
    /// whenever possible.
    #[error("internal agent error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Whether this error was raised before a run started (bad state or
    /// bad input) rather than during a step.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::InvalidState { .. } | Self::InvalidArgument { .. })
    }
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequestFailed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_errors_are_classified() {
        let state = AgentError::InvalidState {
            state: AgentState::Running,
        };
        let arg = AgentError::InvalidArgument {
            reason: "blank prompt".into(),
        };
        let tool = AgentError::UnknownTool {
            tool_name: "nope".into(),
        };

        assert!(state.is_precondition());
        assert!(arg.is_precondition());
        assert!(!tool.is_precondition());
    }

    #[test]
    fn invalid_state_message_names_the_state() {
        let err = AgentError::InvalidState {
            state: AgentState::Finished,
        };
        assert_eq!(err.to_string(), "cannot run agent from state: FINISHED");
    }
}
