//! Tool catalog and tool-execution backend.
//!
//! Tools implement [`Tool`] and are collected into a static [`ToolCatalog`].
//! The act phase never calls tools directly: it hands the assistant's pending
//! tool calls to a [`ToolExecutor`], which appends the assistant message and
//! one result message per call to the conversation and returns the updated
//! history.  [`CatalogExecutor`] is the in-process implementation.
//!
//! Built-in tools:
//!
//! - [`WeatherTool`] -- daily forecast for a place, via Open-Meteo.
//! - [`PdfTool`] -- writes a plan to a PDF and announces the artifact path.

pub mod pdf;
pub mod weather;

pub use pdf::PdfTool;
pub use weather::WeatherTool;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::llm::types::{AssistantMessage, Message, ToolDefinition};

/// Reserved name of the tool whose invocation ends a run.
pub const TERMINATE_TOOL_NAME: &str = "terminate";

// ---------------------------------------------------------------------------
// Tool trait
// ---------------------------------------------------------------------------

/// A single callable tool exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and input schema advertised to the model.
    fn definition(&self) -> ToolDefinition;

    /// Invoke the tool.
    ///
    /// Returns the result as a string suitable for feeding back to the model.
    async fn call(&self, arguments: Value) -> Result<String>;
}

/// The reserved termination tool.
///
/// Calling it has no side effect; the think/act cycle watches for its name
/// among tool results and finishes the run.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminateTool;

impl TerminateTool {
    /// Text returned by every invocation.
    pub const RESULT: &'static str = "Interaction finished.";
}

#[async_trait]
impl Tool for TerminateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: TERMINATE_TOOL_NAME.into(),
            description: "Terminate the interaction when the request is met or when you \
                          cannot proceed further with the task."
                .into(),
            input_schema: json!({ "type": "object", "properties": {} }),
        }
    }

    async fn call(&self, _arguments: Value) -> Result<String> {
        Ok(Self::RESULT.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A fixed, ordered set of uniquely named tools.
///
/// The termination tool is always part of the catalog.
#[derive(Clone)]
pub struct ToolCatalog {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolCatalog {
    /// Build a catalog, appending [`TerminateTool`] when no tool already
    /// claims the reserved name.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ConfigError`] if two tools share a name.
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self> {
        let mut names: Vec<String> = Vec::with_capacity(tools.len() + 1);
        for tool in &tools {
            let name = tool.definition().name;
            if names.contains(&name) {
                return Err(AgentError::ConfigError {
                    reason: format!("duplicate tool name in catalog: {name}"),
                });
            }
            names.push(name);
        }

        let mut tools = tools;
        if !names.iter().any(|n| n == TERMINATE_TOOL_NAME) {
            tools.push(Arc::new(TerminateTool));
        }

        Ok(Self { tools })
    }

    /// A catalog holding only the termination tool.
    pub fn terminate_only() -> Self {
        Self {
            tools: vec![Arc::new(TerminateTool)],
        }
    }

    /// Definitions of every tool, in catalog order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Look a tool up by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.definition().name == name)
    }

    /// Number of tools, the termination tool included.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Always false; the termination tool is always present.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|t| t.definition().name))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tool-execution backend
// ---------------------------------------------------------------------------

/// Resolves an assistant turn's tool calls against the conversation.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute every call in `pending` and return `history` extended with the
    /// assistant message followed by one tool-result message per call, in
    /// request order.
    ///
    /// # Errors
    ///
    /// Fails if any call cannot be resolved; the history is then left as the
    /// caller holds it.
    async fn execute_tool_calls(
        &self,
        history: &[Message],
        pending: &AssistantMessage,
    ) -> Result<Vec<Message>>;
}

/// [`ToolExecutor`] that dispatches to the tools of a [`ToolCatalog`].
#[derive(Debug, Clone)]
pub struct CatalogExecutor {
    catalog: ToolCatalog,
}

impl CatalogExecutor {
    /// Create an executor over `catalog`.
    pub fn new(catalog: ToolCatalog) -> Self {
        Self { catalog }
    }

    /// The catalog this executor resolves against.
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }
}

#[async_trait]
impl ToolExecutor for CatalogExecutor {
    async fn execute_tool_calls(
        &self,
        history: &[Message],
        pending: &AssistantMessage,
    ) -> Result<Vec<Message>> {
        let mut results = Vec::with_capacity(pending.tool_calls.len());

        // Calls run one after another so results land in request order.
        for call in &pending.tool_calls {
            let tool = self
                .catalog
                .get(&call.name)
                .ok_or_else(|| AgentError::UnknownTool {
                    tool_name: call.name.clone(),
                })?;

            tracing::debug!(tool = %call.name, id = %call.id, "executing tool");

            let content = tool.call(call.arguments.clone()).await.map_err(|e| {
                tracing::warn!(tool = %call.name, error = %e, "tool execution failed");
                match e {
                    err @ AgentError::ToolExecutionFailed { .. } => err,
                    other => AgentError::ToolExecutionFailed {
                        tool_name: call.name.clone(),
                        reason: other.to_string(),
                    },
                }
            })?;

            results.push(Message::tool_result(&call.id, &call.name, content));
        }

        let mut updated = Vec::with_capacity(history.len() + results.len() + 1);
        updated.extend_from_slice(history);
        updated.push(pending.to_message());
        updated.extend(results);
        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
