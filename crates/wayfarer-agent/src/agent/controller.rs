//! The execution controller.
//!
//! [`Agent`] owns the lifecycle state and the step loop.  It knows nothing
//! about models or tools: it calls [`StepStrategy::step`] until the run
//! context reports a terminal state or the step budget is spent, and it
//! turns every failure into state plus text so a bad run never escapes as
//! an error or a panic.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::agent::stream::{AgentStream, RunEvent};
use crate::agent::{AgentConfig, AgentState, RunContext, StepRecord, max_steps_notice};
use crate::error::{AgentError, Result};
use crate::llm::types::Message;

/// Capacity of the event channel behind a streaming run.
const STREAM_BUFFER: usize = 32;

// ---------------------------------------------------------------------------
// Step strategy
// ---------------------------------------------------------------------------

/// One unit of agent progress.
#[async_trait]
pub trait StepStrategy: Send {
    /// Perform one step and describe it.
    ///
    /// Errors returned here are fatal to the run.  Recoverable problems must
    /// be folded into the returned text instead, so the step still counts
    /// against the budget.
    async fn step(&mut self, ctx: &mut RunContext) -> Result<String>;

    /// Release resources after a run.  Called exactly once per started run,
    /// on every exit path.
    fn cleanup(&mut self) {}
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Status {
    state: AgentState,
    current_step: u32,
    history: Vec<Message>,
}

/// How a streaming run stopped before reaching its natural end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interruption {
    TimedOut,
    Cancelled,
}

/// A streaming step raced against the deadline and the consumer.
enum Bounded {
    Completed(Result<String>),
    Interrupted(Interruption),
}

/// A configured agent that can execute one run.
///
/// Runs start only from [`AgentState::Idle`]; once a run has ended the
/// agent stays in its terminal state.  Build a new agent for the next run.
pub struct Agent<S> {
    config: Arc<AgentConfig>,
    strategy: tokio::sync::Mutex<S>,
    status: Mutex<Status>,
}

impl<S: StepStrategy> Agent<S> {
    /// Create an idle agent.
    pub fn new(config: AgentConfig, strategy: S) -> Self {
        Self {
            config: Arc::new(config),
            strategy: tokio::sync::Mutex::new(strategy),
            status: Mutex::new(Status::default()),
        }
    }

    // -- Accessors -----------------------------------------------------------

    /// The agent's configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// System prompt sent with every think call.
    pub fn system_prompt(&self) -> &str {
        &self.config.system_prompt
    }

    /// One-time next-step prompt, if configured.
    pub fn next_step_prompt(&self) -> Option<&str> {
        self.config.next_step_prompt.as_deref()
    }

    /// Step budget.
    pub fn max_steps(&self) -> u32 {
        self.config.max_steps
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AgentState {
        self.status().state
    }

    /// Number of the step in progress or last completed.
    pub fn current_step(&self) -> u32 {
        self.status().current_step
    }

    /// Conversation of the finished run (empty until a run ends).
    pub fn history(&self) -> Vec<Message> {
        self.status().history.clone()
    }

    fn status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Blocking mode -------------------------------------------------------

    /// Execute a run to completion and return its aggregated output.
    ///
    /// The output is the newline-joined step records, or the artifact path
    /// of the first step whose result carries the artifact marker.  Step
    /// failures are reported as text and leave the agent in
    /// [`AgentState::Error`].
    ///
    /// # Errors
    ///
    /// Only precondition failures are returned as errors:
    /// [`AgentError::InvalidState`] when the agent is not idle and
    /// [`AgentError::InvalidArgument`] when the prompt is blank.  Nothing
    /// is mutated in that case.
    pub async fn run(&self, user_prompt: &str) -> Result<String> {
        self.begin(user_prompt)?;

        let mut guard = RunGuard {
            strategy: self.strategy.lock().await,
            agent: self,
        };
        let mut ctx = RunContext::new(Arc::clone(&self.config));
        ctx.push_message(Message::user(user_prompt));

        tracing::info!(
            agent = %self.config.name,
            run_id = %ctx.run_id(),
            max_steps = self.config.max_steps,
            "starting run"
        );

        let output = self.drive_blocking(&mut *guard.strategy, &mut ctx).await;
        self.settle(&mut ctx);
        drop(guard);
        Ok(output)
    }

    async fn drive_blocking(&self, strategy: &mut S, ctx: &mut RunContext) -> String {
        let mut lines: Vec<String> = Vec::new();

        while ctx.can_continue() {
            let step = self.start_step(ctx);

            match run_step(strategy, ctx).await {
                Ok(result) => {
                    let record = StepRecord::new(step, result);
                    if let Some(path) = self.config.artifact_marker.extract(&record.result) {
                        tracing::info!(
                            agent = %self.config.name,
                            step,
                            path = %path,
                            "step produced an artifact, ending run"
                        );
                        ctx.finish();
                        return path;
                    }
                    lines.push(record.to_string());
                    self.publish(ctx);
                }
                Err(e) => {
                    ctx.fail();
                    tracing::error!(agent = %self.config.name, step, error = %e, "error executing agent");
                    return format!("Execution error: {e}");
                }
            }
        }

        if ctx.state() == AgentState::Running {
            ctx.finish();
            lines.push(max_steps_notice(ctx.max_steps()));
        }

        lines.join("\n")
    }

    // -- Streaming mode ------------------------------------------------------

    /// Start a run on a separate task and return a live view of it.
    ///
    /// The stream yields one [`RunEvent::Step`] per completed step, then
    /// [`RunEvent::Done`] (preceded by [`RunEvent::BudgetExhausted`] when the
    /// budget ran out) or a single [`RunEvent::Error`].  Precondition
    /// failures arrive as that single error event.  The run is cut off once
    /// [`AgentConfig::stream_timeout`] has elapsed, leaving the agent in
    /// [`AgentState::Error`]; a step in flight at that point gets
    /// [`AgentConfig::cancel_grace`] before it is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run_streaming(self: &Arc<Self>, user_prompt: impl Into<String>) -> AgentStream
    where
        S: 'static,
    {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let deadline = Instant::now() + self.config.stream_timeout;
        let agent = Arc::clone(self);
        let prompt = user_prompt.into();

        tokio::spawn(async move {
            agent.drive_streaming(prompt, tx, deadline).await;
        });

        AgentStream::new(rx, deadline)
    }

    async fn drive_streaming(&self, prompt: String, tx: mpsc::Sender<RunEvent>, deadline: Instant) {
        if let Err(e) = self.begin(&prompt) {
            tracing::warn!(agent = %self.config.name, error = %e, "streaming run rejected");
            let _ = tx.send(RunEvent::error(e.to_string())).await;
            return;
        }

        let mut guard = RunGuard {
            strategy: self.strategy.lock().await,
            agent: self,
        };
        let mut ctx = RunContext::new(Arc::clone(&self.config));
        ctx.push_message(Message::user(prompt));

        tracing::info!(
            agent = %self.config.name,
            run_id = %ctx.run_id(),
            max_steps = self.config.max_steps,
            timeout = ?self.config.stream_timeout,
            "starting streaming run"
        );

        let interruption = self
            .stream_steps(&mut *guard.strategy, &mut ctx, &tx, deadline)
            .await;

        match interruption {
            Some(Interruption::TimedOut) => {
                ctx.fail();
                tracing::warn!(agent = %self.config.name, step = ctx.current_step(), "streaming run timed out");
            }
            Some(Interruption::Cancelled) => {
                ctx.finish();
                tracing::info!(agent = %self.config.name, step = ctx.current_step(), "stream closed by consumer");
            }
            None => tracing::info!(agent = %self.config.name, state = %ctx.state(), "stream completed"),
        }

        self.settle(&mut ctx);
        drop(guard);
    }

    /// Run steps, forwarding each outcome to `tx`.  Returns why the run was
    /// cut short, or `None` if it reached its natural end.
    async fn stream_steps(
        &self,
        strategy: &mut S,
        ctx: &mut RunContext,
        tx: &mpsc::Sender<RunEvent>,
        deadline: Instant,
    ) -> Option<Interruption> {
        let interrupted = |tx: &mpsc::Sender<RunEvent>| {
            if Instant::now() >= deadline {
                Some(Interruption::TimedOut)
            } else if tx.is_closed() {
                Some(Interruption::Cancelled)
            } else {
                None
            }
        };

        while ctx.can_continue() {
            if let Some(reason) = interrupted(tx) {
                return Some(reason);
            }

            let step = self.start_step(ctx);

            let outcome = match self.bounded_step(strategy, ctx, tx, deadline).await {
                Bounded::Completed(outcome) => outcome,
                Bounded::Interrupted(reason) => return Some(reason),
            };

            match outcome {
                Ok(result) => {
                    self.publish(ctx);
                    if let Some(reason) = interrupted(tx) {
                        return Some(reason);
                    }
                    let event = RunEvent::Step(StepRecord::new(step, result));
                    if tx.send(event).await.is_err() {
                        return interrupted(tx).or(Some(Interruption::Cancelled));
                    }
                }
                Err(e) => {
                    ctx.fail();
                    tracing::error!(agent = %self.config.name, step, error = %e, "error executing agent");
                    let _ = tx.send(RunEvent::error(e.to_string())).await;
                    return None;
                }
            }
        }

        if let Some(reason) = interrupted(tx) {
            return Some(reason);
        }

        if ctx.state() == AgentState::Running {
            ctx.finish();
            let _ = tx
                .send(RunEvent::BudgetExhausted {
                    max_steps: ctx.max_steps(),
                })
                .await;
        }
        let _ = tx.send(RunEvent::Done).await;
        None
    }

    /// Run one step unless the deadline passes or the consumer goes away
    /// first.  A timeout is published as [`AgentState::Error`] at once; the
    /// interrupted step then gets [`AgentConfig::cancel_grace`] to settle
    /// before it is dropped.
    async fn bounded_step(
        &self,
        strategy: &mut S,
        ctx: &mut RunContext,
        tx: &mpsc::Sender<RunEvent>,
        deadline: Instant,
    ) -> Bounded {
        let step = run_step(strategy, ctx);
        tokio::pin!(step);

        let reason = tokio::select! {
            biased;
            result = &mut step => return Bounded::Completed(result),
            () = tokio::time::sleep_until(deadline) => Interruption::TimedOut,
            () = tx.closed() => {
                // The consumer also closes the channel when its deadline fires.
                if Instant::now() >= deadline {
                    Interruption::TimedOut
                } else {
                    Interruption::Cancelled
                }
            }
        };

        if reason == Interruption::TimedOut {
            self.status().state = AgentState::Error;
            tracing::warn!(agent = %self.config.name, "deadline passed mid-step");
        }

        let grace = self.config.cancel_grace;
        if tokio::time::timeout(grace, &mut step).await.is_err() {
            tracing::warn!(
                agent = %self.config.name,
                grace = ?grace,
                "in-flight step did not settle, abandoning it"
            );
        }
        Bounded::Interrupted(reason)
    }

    // -- Shared plumbing -----------------------------------------------------

    /// Validate the preconditions and claim the agent for a run.
    fn begin(&self, user_prompt: &str) -> Result<()> {
        let mut status = self.status();
        if status.state != AgentState::Idle {
            return Err(AgentError::InvalidState {
                state: status.state,
            });
        }
        if user_prompt.trim().is_empty() {
            return Err(AgentError::InvalidArgument {
                reason: "cannot run agent with empty user prompt".into(),
            });
        }
        status.state = AgentState::Running;
        Ok(())
    }

    fn start_step(&self, ctx: &mut RunContext) -> u32 {
        let step = ctx.advance();
        self.publish(ctx);
        tracing::info!(
            agent = %self.config.name,
            step,
            max_steps = ctx.max_steps(),
            "executing step {step}/{}",
            ctx.max_steps()
        );
        step
    }

    fn publish(&self, ctx: &RunContext) {
        let mut status = self.status();
        status.state = ctx.state();
        status.current_step = ctx.current_step();
    }

    /// Record the final state and conversation of a run.
    fn settle(&self, ctx: &mut RunContext) {
        let mut status = self.status();
        status.state = ctx.state();
        status.current_step = ctx.current_step();
        status.history = ctx.take_history();
    }
}

impl<S> std::fmt::Debug for Agent<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Run one step, converting a panic into an error.
async fn run_step<S: StepStrategy>(strategy: &mut S, ctx: &mut RunContext) -> Result<String> {
    match AssertUnwindSafe(strategy.step(ctx)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            Err(AgentError::Internal(format!("step panicked: {reason}")))
        }
    }
}

/// Holds the strategy for the duration of a run and runs its cleanup hook
/// when the run ends, however it ends.
struct RunGuard<'a, S: StepStrategy> {
    strategy: tokio::sync::MutexGuard<'a, S>,
    agent: &'a Agent<S>,
}

impl<S: StepStrategy> Drop for RunGuard<'_, S> {
    fn drop(&mut self) {
        {
            let mut status = self.agent.status();
            if status.state == AgentState::Running {
                tracing::warn!(agent = %self.agent.config.name, "run abandoned mid-step");
                status.state = AgentState::Error;
            }
        }
        self.strategy.cleanup();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::StreamExt;

    /// Strategy that returns scripted step results in order.
    struct Scripted {
        steps: Vec<Result<String>>,
        finish_on: Option<u32>,
        delay: Duration,
        cleanups: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(steps: Vec<Result<String>>) -> (Self, Arc<AtomicUsize>) {
            let cleanups = Arc::new(AtomicUsize::new(0));
            let strategy = Self {
                steps: steps.into_iter().rev().collect(),
                finish_on: None,
                delay: Duration::ZERO,
                cleanups: Arc::clone(&cleanups),
            };
            (strategy, cleanups)
        }
    }

    #[async_trait]
    impl StepStrategy for Scripted {
        async fn step(&mut self, ctx: &mut RunContext) -> Result<String> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.finish_on == Some(ctx.current_step()) {
                ctx.finish();
            }
            self.steps.pop().unwrap_or_else(|| Ok("idle".into()))
        }

        fn cleanup(&mut self) {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicking;

    #[async_trait]
    impl StepStrategy for Panicking {
        async fn step(&mut self, _ctx: &mut RunContext) -> Result<String> {
            panic!("strategy exploded");
        }
    }

    fn config(max_steps: u32) -> AgentConfig {
        AgentConfig::new("test-agent").with_max_steps(max_steps)
    }

    #[tokio::test]
    async fn run_rejects_blank_prompt_without_mutating() {
        let (strategy, cleanups) = Scripted::new(vec![]);
        let agent = Agent::new(config(3), strategy);

        let err = agent.run("   ").await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidArgument { .. }));
        assert_eq!(agent.state(), AgentState::Idle);
        assert_eq!(agent.current_step(), 0);
        assert_eq!(cleanups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_rejects_non_idle_agent() {
        let (strategy, _) = Scripted::new(vec![]);
        let agent = Agent::new(config(1), strategy);
        agent.run("first").await.unwrap();

        let err = agent.run("second").await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::InvalidState {
                state: AgentState::Finished
            }
        ));
    }

    #[tokio::test]
    async fn budget_exhaustion_appends_notice() {
        let (strategy, cleanups) = Scripted::new(vec![Ok("a".into()), Ok("b".into())]);
        let agent = Agent::new(config(2), strategy);

        let output = agent.run("go").await.unwrap();
        assert_eq!(output, "Step 1: a\nStep 2: b\nTerminated: Reached max steps (2)");
        assert_eq!(agent.state(), AgentState::Finished);
        assert_eq!(agent.current_step(), 2);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn terminal_signal_stops_without_notice() {
        let (mut strategy, _) = Scripted::new(vec![Ok("a".into()), Ok("b".into())]);
        strategy.finish_on = Some(2);
        let agent = Agent::new(config(5), strategy);

        let output = agent.run("go").await.unwrap();
        assert_eq!(output, "Step 1: a\nStep 2: b");
        assert_eq!(agent.current_step(), 2);
    }

    #[tokio::test]
    async fn step_failure_is_contained() {
        let (strategy, cleanups) = Scripted::new(vec![
            Ok("a".into()),
            Err(AgentError::Internal("backend down".into())),
        ]);
        let agent = Agent::new(config(5), strategy);

        let output = agent.run("go").await.unwrap();
        assert!(output.starts_with("Execution error:"));
        assert!(output.contains("backend down"));
        assert_eq!(agent.state(), AgentState::Error);
        assert_eq!(agent.current_step(), 2);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_step_is_contained() {
        let agent = Agent::new(config(3), Panicking);
        let output = agent.run("go").await.unwrap();
        assert!(output.contains("strategy exploded"));
        assert_eq!(agent.state(), AgentState::Error);
    }

    #[tokio::test]
    async fn first_artifact_wins_and_stops_the_run() {
        let (strategy, cleanups) = Scripted::new(vec![
            Ok("searching".into()),
            Ok("[PDF_GENERATION_SUCCESS] PDF successfully generated to: /tmp/one.pdf".into()),
            Ok("[PDF_GENERATION_SUCCESS] PDF successfully generated to: /tmp/two.pdf".into()),
        ]);
        let agent = Agent::new(config(5), strategy);

        let output = agent.run("make a pdf").await.unwrap();
        assert_eq!(output, "/tmp/one.pdf");
        assert_eq!(agent.current_step(), 2);
        assert_eq!(agent.state(), AgentState::Finished);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn history_is_published_after_run() {
        let (strategy, _) = Scripted::new(vec![]);
        let agent = Agent::new(config(1), strategy);
        agent.run("remember me").await.unwrap();

        let history = agent.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "remember me");
    }

    #[tokio::test]
    async fn streaming_emits_steps_then_done() {
        let (mut strategy, cleanups) = Scripted::new(vec![Ok("a".into()), Ok("b".into())]);
        strategy.finish_on = Some(2);
        let agent = Arc::new(Agent::new(config(5), strategy));

        let events: Vec<RunEvent> = agent.run_streaming("go").collect().await;
        assert_eq!(
            events,
            vec![
                RunEvent::Step(StepRecord::new(1, "a")),
                RunEvent::Step(StepRecord::new(2, "b")),
                RunEvent::Done,
            ]
        );
        assert_eq!(agent.state(), AgentState::Finished);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn streaming_reports_budget_exhaustion() {
        let (strategy, _) = Scripted::new(vec![]);
        let agent = Arc::new(Agent::new(config(1), strategy));

        let events: Vec<RunEvent> = agent.run_streaming("go").collect().await;
        assert_eq!(
            events,
            vec![
                RunEvent::Step(StepRecord::new(1, "idle")),
                RunEvent::BudgetExhausted { max_steps: 1 },
                RunEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn streaming_step_failure_emits_error_and_closes() {
        let (strategy, cleanups) =
            Scripted::new(vec![Err(AgentError::Internal("tool blew up".into()))]);
        let agent = Arc::new(Agent::new(config(3), strategy));

        let events: Vec<RunEvent> = agent.run_streaming("go").collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], RunEvent::Error { message } if message.contains("tool blew up")));
        assert_eq!(agent.state(), AgentState::Error);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn streaming_on_busy_agent_emits_single_error() {
        let (strategy, cleanups) = Scripted::new(vec![]);
        let agent = Arc::new(Agent::new(config(1), strategy));
        agent.run("first").await.unwrap();
        let steps_before = agent.current_step();

        let events: Vec<RunEvent> = agent.run_streaming("second").collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], RunEvent::Error { message } if message.contains("FINISHED")));
        assert_eq!(agent.current_step(), steps_before);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn streaming_blank_prompt_emits_single_error() {
        let (strategy, cleanups) = Scripted::new(vec![]);
        let agent = Arc::new(Agent::new(config(1), strategy));

        let events: Vec<RunEvent> = agent.run_streaming("").collect().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
        assert_eq!(agent.state(), AgentState::Idle);
        assert_eq!(cleanups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn streaming_timeout_sets_error_and_cleans_up_once() {
        let (mut strategy, cleanups) = Scripted::new(vec![]);
        strategy.delay = Duration::from_millis(30);
        let config = config(100).with_stream_timeout(Duration::from_millis(80));
        let agent = Arc::new(Agent::new(config, strategy));

        let mut stream = agent.run_streaming("go");
        while stream.next().await.is_some() {}
        assert!(stream.timed_out());

        // The in-flight step gets its grace period before the run stops.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(agent.state(), AgentState::Error);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        assert!(agent.current_step() < 100);
    }

    #[tokio::test]
    async fn hanging_step_is_abandoned_after_deadline() {
        let (mut strategy, cleanups) = Scripted::new(vec![]);
        strategy.delay = Duration::from_secs(3600);
        let config = config(5)
            .with_stream_timeout(Duration::from_millis(50))
            .with_cancel_grace(Duration::from_millis(20));
        let agent = Arc::new(Agent::new(config, strategy));

        let mut stream = agent.run_streaming("go");
        assert!(stream.next().await.is_none());
        assert!(stream.timed_out());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(agent.state(), AgentState::Error);
        assert_eq!(agent.current_step(), 1);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_is_visible_before_the_step_settles() {
        let (mut strategy, cleanups) = Scripted::new(vec![]);
        strategy.delay = Duration::from_secs(3600);
        let config = config(5)
            .with_stream_timeout(Duration::from_millis(40))
            .with_cancel_grace(Duration::from_secs(3600));
        let agent = Arc::new(Agent::new(config, strategy));

        let mut stream = agent.run_streaming("go");
        while stream.next().await.is_some() {}
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(agent.state(), AgentState::Error);
        assert_eq!(cleanups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dropping_the_stream_abandons_a_hanging_step() {
        let (mut strategy, cleanups) = Scripted::new(vec![]);
        strategy.delay = Duration::from_secs(3600);
        let config = config(5).with_cancel_grace(Duration::from_millis(20));
        let agent = Arc::new(Agent::new(config, strategy));

        let stream = agent.run_streaming("go");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(agent.state(), AgentState::Running);
        drop(stream);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(agent.state(), AgentState::Finished);
        assert_eq!(agent.current_step(), 1);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_the_stream_cancels_after_current_step() {
        let (mut strategy, cleanups) = Scripted::new(vec![]);
        strategy.delay = Duration::from_millis(20);
        let agent = Arc::new(Agent::new(config(100), strategy));

        let mut stream = agent.run_streaming("go");
        let first = stream.next().await;
        assert!(matches!(first, Some(RunEvent::Step(_))));
        drop(stream);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(agent.state(), AgentState::Finished);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        assert!(agent.current_step() < 100);
    }
}
