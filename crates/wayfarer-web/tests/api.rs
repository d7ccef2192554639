//! End-to-end tests for the HTTP API.
//!
//! These tests bind the real router on an OS-assigned ephemeral port and
//! make actual HTTP requests via `reqwest`.  The model backend is a local
//! double, so no network access beyond loopback is needed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use wayfarer_agent::{
    AgentConfig, AssistantMessage, ChatRequest, ModelBackend, Result, Tool, ToolCall, ToolCatalog,
    ToolDefinition,
};
use wayfarer_web::api::StatusResponse;
use wayfarer_web::{AppState, router};

// ── helpers ──────────────────────────────────────────────────────────────────

/// Backend that answers every request with the same turn.
struct FixedBackend {
    turn: AssistantMessage,
    calls: AtomicUsize,
}

#[async_trait]
impl ModelBackend for FixedBackend {
    async fn complete(&self, _request: &ChatRequest) -> Result<AssistantMessage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.turn.clone())
    }
}

struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "weather".into(),
            description: "Forecast for a city".into(),
            input_schema: json!({ "type": "object" }),
        }
    }

    async fn call(&self, _arguments: Value) -> Result<String> {
        Ok("sunny, 24C".into())
    }
}

fn answering(text: &str) -> Arc<FixedBackend> {
    Arc::new(FixedBackend {
        turn: AssistantMessage::text(text),
        calls: AtomicUsize::new(0),
    })
}

fn calling_weather() -> Arc<FixedBackend> {
    Arc::new(FixedBackend {
        turn: AssistantMessage::with_tool_calls(
            "",
            vec![ToolCall::new("c1", "weather", json!({ "city": "Kyoto" }))],
        ),
        calls: AtomicUsize::new(0),
    })
}

/// Bind to 127.0.0.1:0, start the router, return (base_url, server task).
async fn start_test_server(
    backend: Arc<FixedBackend>,
    max_steps: u32,
) -> (String, tokio::task::JoinHandle<()>) {
    let tools = ToolCatalog::new(vec![Arc::new(WeatherTool)]).unwrap();
    let config = AgentConfig::new("web-test").with_max_steps(max_steps);
    let state = AppState::new(backend, tools, config);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to port 0");
    let addr: SocketAddr = listener.local_addr().expect("get local addr");
    let base = format!("http://127.0.0.1:{}", addr.port());

    let app = router(Arc::new(state));
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (base, handle)
}

// ── GET /api/status ──────────────────────────────────────────────────────────

#[tokio::test]
async fn status_reports_tool_count() {
    let (base, _srv) = start_test_server(answering("hi"), 3).await;

    let resp = reqwest::get(format!("{base}/api/status"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), 200);

    let body: StatusResponse = resp.json().await.expect("invalid JSON");
    assert_eq!(body.status, "ok");
    assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    // weather + terminate
    assert_eq!(body.tool_count, 2);
}

// ── GET /api/agent/run ───────────────────────────────────────────────────────

#[tokio::test]
async fn run_returns_aggregated_text() {
    let (base, _srv) = start_test_server(answering("Temples in the morning."), 3).await;

    let resp = reqwest::get(format!("{base}/api/agent/run?message=plan%20a%20one-day%20trip"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), 200);

    let text = resp.text().await.expect("body");
    assert_eq!(
        text,
        "Step 1: terminate completed with result: Interaction finished."
    );
}

#[tokio::test]
async fn each_request_gets_a_fresh_agent() {
    let backend = answering("done");
    let (base, _srv) = start_test_server(backend.clone(), 3).await;
    let url = format!("{base}/api/agent/run?message=again");

    for _ in 0..2 {
        let resp = reqwest::get(&url).await.expect("request failed");
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.text().await.expect("body"),
            "Step 1: terminate completed with result: Interaction finished."
        );
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn run_budget_exhaustion_is_reported_in_text() {
    let (base, _srv) = start_test_server(calling_weather(), 2).await;

    let text = reqwest::get(format!("{base}/api/agent/run?message=weather"))
        .await
        .expect("request failed")
        .text()
        .await
        .expect("body");

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Step 1: weather completed with result: sunny, 24C",
            "Step 2: weather completed with result: sunny, 24C",
            "Terminated: Reached max steps (2)",
        ]
    );
}

#[tokio::test]
async fn blank_message_is_a_bad_request() {
    let backend = answering("unused");
    let (base, _srv) = start_test_server(backend.clone(), 3).await;

    let resp = reqwest::get(format!("{base}/api/agent/run?message=%20%20"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), 400);
    assert!(resp.text().await.expect("body").contains("empty user prompt"));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_message_is_a_bad_request() {
    let (base, _srv) = start_test_server(answering("unused"), 3).await;

    let resp = reqwest::get(format!("{base}/api/agent/run"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), 400);
}

// ── GET /api/agent/stream ────────────────────────────────────────────────────

#[tokio::test]
async fn stream_emits_one_event_per_step_then_done() {
    let (base, _srv) = start_test_server(calling_weather(), 2).await;

    let resp = reqwest::get(format!("{base}/api/agent/stream?message=weather"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), 200);
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    assert!(content_type.starts_with("text/event-stream"));

    let body = resp.text().await.expect("body");
    assert_eq!(body.matches("event: step").count(), 2);
    assert!(body.contains("data: Step 1: weather completed with result: sunny, 24C"));
    assert!(body.contains("event: budget_exhausted"));
    assert!(body.contains("data: Terminated: Reached max steps (2)"));
    assert!(body.contains("event: done"));

    let done_at = body.find("event: done").unwrap();
    let last_step_at = body.rfind("event: step").unwrap();
    assert!(last_step_at < done_at);
}

#[tokio::test]
async fn stream_blank_message_emits_single_error_event() {
    let backend = answering("unused");
    let (base, _srv) = start_test_server(backend.clone(), 3).await;

    let body = reqwest::get(format!("{base}/api/agent/stream?message="))
        .await
        .expect("request failed")
        .text()
        .await
        .expect("body");

    assert_eq!(body.matches("event: ").count(), 1);
    assert!(body.contains("event: error"));
    assert!(body.contains("data: Execution error: invalid argument: cannot run agent with empty user prompt"));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}
