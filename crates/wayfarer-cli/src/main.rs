//! CLI entry point for Wayfarer.
//!
//! This binary provides the `wayfarer` command with subcommands for a
//! one-shot run, a streaming run, and serving the agent over HTTP.

mod cli;
mod helpers;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use futures::StreamExt;
use tracing::{info, warn};

use wayfarer_agent::{AgentState, RunEvent};
use wayfarer_web::{WebConfig, WebServer};

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::helpers::{app_state, build_agent, build_backend, init_tracing, load_settings};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the environment may already be populated.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { prompt } => cmd_run(&cli.global, &prompt).await,
        Commands::Stream { prompt } => cmd_stream(&cli.global, prompt).await,
        Commands::Serve { bind, port } => cmd_serve(&cli.global, bind, port).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: run
// ---------------------------------------------------------------------------

async fn cmd_run(global: &GlobalArgs, prompt: &str) -> Result<()> {
    init_tracing("warn");

    let settings = load_settings(&global.config, global.max_steps)?;
    let llm = build_backend(&settings)?;
    let agent = build_agent(&settings, llm)?;

    let output = agent.run(prompt).await.context("agent run rejected")?;
    println!("{output}");

    if agent.state() == AgentState::Error {
        bail!("agent run ended in {} state", agent.state());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: stream
// ---------------------------------------------------------------------------

async fn cmd_stream(global: &GlobalArgs, prompt: String) -> Result<()> {
    init_tracing("warn");

    let settings = load_settings(&global.config, global.max_steps)?;
    let llm = build_backend(&settings)?;
    let agent = Arc::new(build_agent(&settings, llm)?);

    let mut stream = agent.run_streaming(prompt);
    let mut failed = false;
    let mut stdout = std::io::stdout();

    while let Some(event) = stream.next().await {
        failed |= matches!(event, RunEvent::Error { .. });
        writeln!(stdout, "{event}").context("failed to write to stdout")?;
        stdout.flush().context("failed to flush stdout")?;
    }

    if stream.timed_out() {
        warn!(timeout = ?agent.config().stream_timeout, "streaming run timed out");
        bail!(
            "streaming run timed out after {:?}",
            agent.config().stream_timeout
        );
    }
    if failed {
        bail!("agent run failed");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(global: &GlobalArgs, bind: String, port: u16) -> Result<()> {
    init_tracing("info");

    let settings = load_settings(&global.config, global.max_steps)?;
    let llm = build_backend(&settings)?;
    let state = app_state(&settings, llm)?;

    let server = WebServer::new(
        WebConfig {
            bind_addr: bind,
            port,
        },
        state,
    );
    info!(addr = %server.addr(), "serving agent");

    server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("web server failed")
}
