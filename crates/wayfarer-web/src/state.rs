//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers.  It does not hold an agent: agents are single-use, so it holds
//! what is needed to build one per request.

use std::sync::Arc;

use wayfarer_agent::{Agent, AgentConfig, ModelBackend, ReactCycle, ToolCatalog};

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Model backend shared by every run.
    pub llm: Arc<dyn ModelBackend>,

    /// Tools offered to the model.
    pub tools: ToolCatalog,

    /// Configuration applied to each new agent.
    pub agent_config: AgentConfig,

    /// Model requested from the backend; empty means the backend default.
    pub model: String,

    /// Sampling temperature, if overridden.
    pub temperature: Option<f32>,
}

impl AppState {
    /// Create state with the backend's default model.
    pub fn new(llm: Arc<dyn ModelBackend>, tools: ToolCatalog, agent_config: AgentConfig) -> Self {
        Self {
            llm,
            tools,
            agent_config,
            model: String::new(),
            temperature: None,
        }
    }

    /// Build an idle agent for one run.
    pub fn build_agent(&self) -> Agent<ReactCycle> {
        let mut cycle =
            ReactCycle::new(Arc::clone(&self.llm), self.tools.clone()).with_model(&self.model);
        if let Some(temperature) = self.temperature {
            cycle = cycle.with_temperature(temperature);
        }
        Agent::new(self.agent_config.clone(), cycle)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("tools", &self.tools)
            .field("agent", &self.agent_config.name)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
