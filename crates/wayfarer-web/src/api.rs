//! REST and SSE route handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use wayfarer_agent::RunEvent;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Response payload for the `/api/status` endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub tool_count: usize,
}

/// Return basic service status.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        tool_count: state.tools.len(),
    })
}

// ---------------------------------------------------------------------------
// Agent runs
// ---------------------------------------------------------------------------

/// Query string shared by the run endpoints.
#[derive(Debug, Deserialize)]
pub struct RunQuery {
    /// The user prompt.
    pub message: String,
}

/// Run an agent to completion and return its aggregated output as text.
///
/// Step failures are part of the output (the run itself succeeded in
/// producing a report); only rejected runs map to `400 Bad Request`.
pub async fn run_agent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunQuery>,
) -> (StatusCode, String) {
    let agent = state.build_agent();

    match agent.run(&query.message).await {
        Ok(output) => {
            tracing::info!(agent = %agent.name(), state = %agent.state(), "run request completed");
            (StatusCode::OK, output)
        }
        Err(e) => {
            tracing::warn!(error = %e, "run request rejected");
            let status = if e.is_precondition() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, e.to_string())
        }
    }
}

/// Stream a run as Server-Sent Events.
///
/// Each [`RunEvent`] becomes one event whose name is the event kind and
/// whose data is its display text.  Closing the connection cancels the run
/// after its current step.
pub async fn stream_agent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let agent = Arc::new(state.build_agent());
    let events = agent.run_streaming(query.message).map(|event| Ok(to_sse(&event)));

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn to_sse(event: &RunEvent) -> Event {
    let name = match event {
        RunEvent::Step(_) => "step",
        RunEvent::BudgetExhausted { .. } => "budget_exhausted",
        RunEvent::Done => "done",
        RunEvent::Error { .. } => "error",
    };
    Event::default().event(name).data(event.to_string())
}

