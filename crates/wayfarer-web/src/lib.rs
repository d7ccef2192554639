//! Web interface for Wayfarer.
//!
//! This crate exposes a configured agent over HTTP:
//!
//! - `GET /api/status` for liveness and catalog size.
//! - `GET /api/agent/run?message=` for a blocking run returning plain text.
//! - `GET /api/agent/stream?message=` for a Server-Sent Events stream with
//!   one event per completed step.
//!
//! An agent runs once, so every request gets a fresh one from [`AppState`].

pub mod api;
pub mod server;
pub mod state;

pub use server::{WebServer, router};
pub use state::AppState;

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 3000,
        }
    }
}
