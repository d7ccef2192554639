//! Per-run execution state.

use std::sync::Arc;

use uuid::Uuid;

use crate::agent::{AgentConfig, AgentState};
use crate::error::{AgentError, Result};
use crate::llm::types::{Message, last_user_message};

/// Everything that changes while one run executes.
///
/// A fresh context is created for every run and is owned by the task
/// driving that run, so nothing here is shared between runs.
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    config: Arc<AgentConfig>,
    state: AgentState,
    current_step: u32,
    history: Vec<Message>,
}

impl RunContext {
    /// Create the context for a new run in state [`AgentState::Running`].
    pub fn new(config: Arc<AgentConfig>) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            config,
            state: AgentState::Running,
            current_step: 0,
            history: Vec::new(),
        }
    }

    /// Unique identifier of this run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Configuration of the agent executing this run.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Number of the step in progress (or last completed), 0 before the
    /// first step.
    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    /// Step budget of this run.
    pub fn max_steps(&self) -> u32 {
        self.config.max_steps
    }

    /// The conversation so far.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// The most recent user message, if any.
    pub fn current_user_message(&self) -> Option<&Message> {
        last_user_message(&self.history)
    }

    /// Append a message to the conversation.
    pub fn push_message(&mut self, message: Message) {
        self.history.push(message);
    }

    /// Replace the conversation with an extended copy of itself, as returned
    /// by a tool-execution backend.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Internal`] and keeps the current history when
    /// `updated` does not start with it.
    pub fn replace_history(&mut self, updated: Vec<Message>) -> Result<()> {
        if updated.len() < self.history.len() || updated[..self.history.len()] != self.history[..] {
            tracing::error!(
                run_id = %self.run_id,
                held = self.history.len(),
                offered = updated.len(),
                "tool executor rewrote earlier messages"
            );
            return Err(AgentError::Internal(
                "tool executor rewrote earlier conversation history".into(),
            ));
        }
        self.history = updated;
        Ok(())
    }

    /// Signal that the run has reached its terminal condition.
    pub fn finish(&mut self) {
        if self.state == AgentState::Running {
            self.state = AgentState::Finished;
        }
    }

    /// Whether another step may start.
    pub(crate) fn can_continue(&self) -> bool {
        self.state == AgentState::Running && self.current_step < self.config.max_steps
    }

    /// Start the next step and return its 1-based number.
    pub(crate) fn advance(&mut self) -> u32 {
        self.current_step += 1;
        self.current_step
    }

    /// Mark the run as failed.
    pub(crate) fn fail(&mut self) {
        self.state = AgentState::Error;
    }

    /// Hand the conversation over once the run is over.
    pub(crate) fn take_history(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.history)
    }
}
