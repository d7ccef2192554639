//! The think/act cycle.
//!
//! Each step asks the model backend for the next action (think) and, when
//! there is one, resolves it (act).  Tool calls go through a
//! [`ToolExecutor`]; the reserved termination tool finishes the run.  A
//! model that answers without calling any tool is taken to be done: its
//! answer is recorded and the run terminates, instead of idling until the
//! step budget runs out.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::{RunContext, StepStrategy};
use crate::error::Result;
use crate::llm::backend::ModelBackend;
use crate::llm::types::{AssistantMessage, ChatRequest, Message, ToolDefinition, latest_tool_results};
use crate::tools::{CatalogExecutor, TERMINATE_TOOL_NAME, TerminateTool, Tool, ToolCatalog, ToolExecutor};

/// Side-effect-only hook run once after every run.
pub type CleanupHook = Box<dyn FnMut() + Send>;

/// What the model decided to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Resolve the tool calls of this assistant turn.
    Invoke(AssistantMessage),
    /// End the run.  `closing` is the model's final text, possibly empty.
    Terminate { closing: String },
}

/// Outcome of the think phase.
#[derive(Debug, Clone, PartialEq)]
pub enum Thought {
    /// There is an action to take.
    Act(Action),
    /// Nothing to act on this step; carries a diagnostic for the step record.
    Idle { diagnostic: String },
}

impl Thought {
    /// Whether the act phase should run.
    pub fn should_act(&self) -> bool {
        matches!(self, Self::Act(_))
    }
}

/// [`StepStrategy`] implementing one think/act pair per step.
pub struct ReactCycle {
    llm: Arc<dyn ModelBackend>,
    executor: Arc<dyn ToolExecutor>,
    tools: Vec<ToolDefinition>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    next_step_injected: bool,
    on_cleanup: Option<CleanupHook>,
}

impl ReactCycle {
    /// Create a cycle that resolves tool calls against `catalog`.
    pub fn new(llm: Arc<dyn ModelBackend>, catalog: ToolCatalog) -> Self {
        let tools = catalog.definitions();
        Self::with_executor(llm, Arc::new(CatalogExecutor::new(catalog)), tools)
    }

    /// Create a cycle with a custom tool-execution backend.
    ///
    /// `tools` is the catalog advertised to the model; the termination tool
    /// is added when missing.
    pub fn with_executor(
        llm: Arc<dyn ModelBackend>,
        executor: Arc<dyn ToolExecutor>,
        mut tools: Vec<ToolDefinition>,
    ) -> Self {
        if !tools.iter().any(|t| t.name == TERMINATE_TOOL_NAME) {
            tools.push(TerminateTool.definition());
        }
        Self {
            llm,
            executor,
            tools,
            model: String::new(),
            temperature: None,
            max_tokens: None,
            next_step_injected: false,
            on_cleanup: None,
        }
    }

    /// Request a specific model instead of the backend default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Cap tokens per model response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Install a cleanup hook.
    pub fn with_cleanup(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_cleanup = Some(Box::new(hook));
        self
    }

    /// The tool catalog advertised to the model.
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Ask the model what to do next.
    ///
    /// Backend failures are recorded in the conversation and yield
    /// [`Thought::Idle`]; they never fail the step.
    pub async fn think(&mut self, ctx: &mut RunContext) -> Thought {
        if !self.next_step_injected {
            if let Some(prompt) = ctx.config().next_step_prompt.clone() {
                ctx.push_message(Message::user(prompt));
            }
            self.next_step_injected = true;
        }

        let request = ChatRequest {
            model: self.model.clone(),
            system_prompt: ctx.config().system_prompt.clone(),
            messages: ctx.history().to_vec(),
            tools: self.tools.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            internal_tool_execution: false,
        };

        let agent = ctx.config().name.clone();
        match self.llm.complete(&request).await {
            Ok(turn) => {
                tracing::info!(agent = %agent, thought = %turn.text, "thinking");
                tracing::info!(
                    agent = %agent,
                    tool_count = turn.tool_calls.len(),
                    "selected tools"
                );
                for call in &turn.tool_calls {
                    tracing::info!(agent = %agent, tool = %call.name, arguments = %call.arguments, "tool call");
                }

                if turn.has_tool_calls() {
                    Thought::Act(Action::Invoke(turn))
                } else {
                    tracing::info!(agent = %agent, "no tool calls, terminating");
                    Thought::Act(Action::Terminate { closing: turn.text })
                }
            }
            Err(e) => {
                tracing::error!(agent = %agent, error = %e, "thinking failed");
                let diagnostic = format!("Error while processing: {e}");
                ctx.push_message(Message::assistant(diagnostic.clone()));
                Thought::Idle { diagnostic }
            }
        }
    }

    /// Carry out `action` and summarise what happened.
    ///
    /// A [`Action::Terminate`] reads exactly like an explicit termination
    /// call; the closing text only goes into the conversation.
    ///
    /// # Errors
    ///
    /// Propagates tool-execution failures, and fails when the executor
    /// hands back a history that rewrites earlier messages.  Both end the
    /// run.
    pub async fn act(&mut self, ctx: &mut RunContext, action: Action) -> Result<String> {
        match action {
            Action::Invoke(turn) => {
                if !turn.has_tool_calls() {
                    return Ok("No tool calls".into());
                }

                let updated = self
                    .executor
                    .execute_tool_calls(ctx.history(), &turn)
                    .await?;
                ctx.replace_history(updated)?;

                let responses = latest_tool_results(ctx.history());
                let summary = responses
                    .iter()
                    .map(|m| {
                        format!(
                            "{} completed with result: {}",
                            m.name.as_deref().unwrap_or("tool"),
                            m.content
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n");

                if responses
                    .iter()
                    .any(|m| m.name.as_deref() == Some(TERMINATE_TOOL_NAME))
                {
                    tracing::info!(agent = %ctx.config().name, "termination tool called");
                    ctx.finish();
                }

                tracing::info!(agent = %ctx.config().name, "{summary}");
                Ok(summary)
            }
            Action::Terminate { closing } => {
                if !closing.is_empty() {
                    ctx.push_message(Message::assistant(closing.clone()));
                }
                let result = TerminateTool.call(Value::Object(Default::default())).await?;
                ctx.finish();

                Ok(format!("{TERMINATE_TOOL_NAME} completed with result: {result}"))
            }
        }
    }
}

#[async_trait]
impl StepStrategy for ReactCycle {
    async fn step(&mut self, ctx: &mut RunContext) -> Result<String> {
        match self.think(ctx).await {
            Thought::Act(action) => self.act(ctx, action).await,
            Thought::Idle { diagnostic } => Ok(diagnostic),
        }
    }

    fn cleanup(&mut self) {
        if let Some(hook) = self.on_cleanup.as_mut() {
            hook();
        }
    }
}

impl std::fmt::Debug for ReactCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactCycle")
            .field("tools", &self.tools.iter().map(|t| &t.name).collect::<Vec<_>>())
            .field("model", &self.model)
            .field("next_step_injected", &self.next_step_injected)
            .finish_non_exhaustive()
    }
}
