//! The model backend seam.
//!
//! The think phase only ever talks to a [`ModelBackend`].  [`LlmClient`]
//! is the production implementation; tests script their own.
//!
//! [`LlmClient`]: crate::llm::LlmClient

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::types::{AssistantMessage, ChatRequest};

/// Something that turns a conversation into the next assistant turn.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Ask the model for the next assistant turn.
    ///
    /// Implementations must not execute any tool calls they return; the
    /// caller resolves them.
    async fn complete(&self, request: &ChatRequest) -> Result<AssistantMessage>;
}

#[async_trait]
impl<T: ModelBackend + ?Sized> ModelBackend for Arc<T> {
    async fn complete(&self, request: &ChatRequest) -> Result<AssistantMessage> {
        (**self).complete(request).await
    }
}

/// Decorator that logs every request and response of the wrapped backend.
pub struct LoggingBackend<B> {
    inner: B,
}

impl<B: ModelBackend> LoggingBackend<B> {
    /// Wrap `inner`.
    pub fn new(inner: B) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<B: ModelBackend> ModelBackend for LoggingBackend<B> {
    async fn complete(&self, request: &ChatRequest) -> Result<AssistantMessage> {
        tracing::debug!(
            model = %request.model,
            message_count = request.messages.len(),
            tool_count = request.tools.len(),
            last = ?request.messages.last().map(|m| m.content.as_str()),
            "model request"
        );

        let result = self.inner.complete(request).await;

        match &result {
            Ok(turn) => tracing::debug!(
                text = %turn.text,
                tools = ?turn.tool_calls.iter().map(|c| &c.name).collect::<Vec<_>>(),
                "model response"
            ),
            Err(e) => tracing::debug!(error = %e, "model request failed"),
        }

        result
    }
}
