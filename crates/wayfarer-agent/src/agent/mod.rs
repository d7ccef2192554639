//! Step-bounded agent execution.
//!
//! An [`Agent`] drives a [`StepStrategy`] one step at a time until the
//! strategy signals completion or the step budget runs out.  [`ReactCycle`]
//! is the think/act strategy that talks to a model backend and resolves
//! tool calls.
//!
//! ```text
//!   IDLE ──run──> RUNNING ──terminal signal / budget──> FINISHED
//!                    │
//!                    └──────step failure / timeout────> ERROR
//! ```

mod context;
mod controller;
mod react;
mod stream;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use context::RunContext;
pub use controller::{Agent, StepStrategy};
pub use react::{Action, CleanupHook, ReactCycle, Thought};
pub use stream::{AgentStream, RunEvent};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentState {
    /// Configured, never run.
    #[default]
    Idle,
    /// A run is in progress.
    Running,
    /// The run ended normally.
    Finished,
    /// The run ended with a failure or timed out.
    Error,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default step budget.
pub const DEFAULT_MAX_STEPS: u32 = 10;

/// Default total duration of a streaming run.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time an interrupted streaming step gets to settle.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Static configuration of one agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Display name used in logs.
    pub name: String,

    /// Fixed instruction sent with every think call.
    pub system_prompt: String,

    /// Extra user instruction injected once, before the first think call.
    pub next_step_prompt: Option<String>,

    /// Step budget.  Must be at least 1.
    pub max_steps: u32,

    /// Total time a streaming run may take before it is cut off.
    pub stream_timeout: Duration,

    /// How long a streaming step cut off by the deadline or by the consumer
    /// may keep running before it is dropped.
    pub cancel_grace: Duration,

    /// Convention that lets a step hand back a file path instead of text.
    pub artifact_marker: ArtifactMarker,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "agent".into(),
            system_prompt: String::new(),
            next_step_prompt: None,
            max_steps: DEFAULT_MAX_STEPS,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            cancel_grace: DEFAULT_CANCEL_GRACE,
            artifact_marker: ArtifactMarker::default(),
        }
    }
}

impl AgentConfig {
    /// Create a configuration with the given name and default limits.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the one-time next-step prompt.
    pub fn with_next_step_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.next_step_prompt = Some(prompt.into());
        self
    }

    /// Set the step budget.  Zero is clamped to one.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Set the streaming timeout.
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Set the grace period for interrupted streaming steps.
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }
}

// ---------------------------------------------------------------------------
// Step records and artifacts
// ---------------------------------------------------------------------------

/// Outcome of one completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// 1-based step number.
    pub step: u32,
    /// Human-readable step summary.
    pub result: String,
}

impl StepRecord {
    /// Create a record.
    pub fn new(step: u32, result: impl Into<String>) -> Self {
        Self {
            step,
            result: result.into(),
        }
    }
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {}: {}", self.step, self.result)
    }
}

/// Text appended when a run stops on its step budget.
pub fn max_steps_notice(max_steps: u32) -> String {
    format!("Terminated: Reached max steps ({max_steps})")
}

/// A reserved tag plus a path prefix that together mark a step result as
/// having produced a file.
///
/// A result matches when it contains `tag` and `path_prefix`; the path is
/// the rest of the line after `path_prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMarker {
    /// Success tag that must appear somewhere in the result.
    pub tag: String,
    /// Text immediately preceding the artifact path.
    pub path_prefix: String,
}

impl Default for ArtifactMarker {
    fn default() -> Self {
        Self {
            tag: "[PDF_GENERATION_SUCCESS]".into(),
            path_prefix: "PDF successfully generated to:".into(),
        }
    }
}

impl ArtifactMarker {
    /// The line a tool returns to announce a file at `path`.
    pub fn announce(&self, path: &str) -> String {
        format!("{} {} {path}", self.tag, self.path_prefix)
    }

    /// Extract the artifact path from a step result, if it carries one.
    pub fn extract(&self, text: &str) -> Option<String> {
        if self.tag.is_empty() || !text.contains(&self.tag) {
            return None;
        }
        let idx = text.find(&self.path_prefix)?;
        let rest = &text[idx + self.path_prefix.len()..];
        let line = rest.lines().next().unwrap_or_default();
        let path = line.replace(&self.tag, "");
        let path = path.trim();
        (!path.is_empty()).then(|| path.to_owned())
    }
}
