//! The consumer side of a streaming run.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, Sleep};

use crate::agent::{StepRecord, max_steps_notice};

/// One event of a streaming run, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A step completed.
    Step(StepRecord),
    /// The step budget ran out before the run finished on its own.
    BudgetExhausted { max_steps: u32 },
    /// The run completed normally.  Always the last event of such a run.
    Done,
    /// The run was rejected or a step failed.  Always the last event.
    Error { message: String },
}

impl RunEvent {
    /// Build an error event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Whether no event follows this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(record) => record.fmt(f),
            Self::BudgetExhausted { max_steps } => f.write_str(&max_steps_notice(*max_steps)),
            Self::Done => f.write_str("Execution finished"),
            Self::Error { message } => write!(f, "Execution error: {message}"),
        }
    }
}

/// Live view of a streaming run.
///
/// Yields [`RunEvent`]s as steps complete.  The stream ends when the run
/// ends, or at once when the run's deadline passes (any events still queued
/// are discarded).  Dropping the stream, or calling [`AgentStream::close`],
/// cancels the run once its in-flight step settles or runs out of
/// [`AgentConfig::cancel_grace`](crate::AgentConfig::cancel_grace).
pub struct AgentStream {
    rx: mpsc::Receiver<RunEvent>,
    deadline: Pin<Box<Sleep>>,
    expired: bool,
}

impl AgentStream {
    pub(crate) fn new(rx: mpsc::Receiver<RunEvent>, deadline: Instant) -> Self {
        Self {
            rx,
            deadline: Box::pin(tokio::time::sleep_until(deadline)),
            expired: false,
        }
    }

    /// Stop receiving.  The run stops after its current step.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Whether the stream was cut off by the run's deadline.
    pub fn timed_out(&self) -> bool {
        self.expired
    }
}

impl Stream for AgentStream {
    type Item = RunEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<RunEvent>> {
        if self.expired {
            return Poll::Ready(None);
        }
        if self.deadline.as_mut().poll(cx).is_ready() {
            self.expired = true;
            self.rx.close();
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl fmt::Debug for AgentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentStream")
            .field("expired", &self.expired)
            .finish_non_exhaustive()
    }
}
