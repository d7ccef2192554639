//! CLI argument definitions for Wayfarer.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Wayfarer -- a step-bounded travel planning agent.
#[derive(Debug, Parser)]
#[command(
    name = "wayfarer",
    version,
    about = "Wayfarer -- step-bounded travel planning agent",
    long_about = "Runs a model-backed agent through a bounded number of think/act steps, \
                  either printing the whole run at the end, streaming each step, or \
                  serving both modes over HTTP."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Settings file (TOML, or JSON when the name ends in `.json`).
    #[arg(long, short, global = true, default_value = "wayfarer.toml")]
    pub config: PathBuf,

    /// Override the step budget.
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_steps: Option<u32>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the agent once and print the aggregated result.
    Run {
        /// What to ask the agent.
        prompt: String,
    },

    /// Run the agent once, printing each step as it completes.
    Stream {
        /// What to ask the agent.
        prompt: String,
    },

    /// Serve the agent over HTTP.
    Serve {
        /// Address to bind the HTTP server to.
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// Port to listen on.
        #[arg(long, short, default_value_t = 8123)]
        port: u16,
    },
}
