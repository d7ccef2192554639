//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, settings resolution, and construction of
//! the model backend and agents from settings.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use wayfarer_agent::{
    Agent, LlmClient, LoggingBackend, ModelBackend, ReactCycle, Settings, ToolCatalog,
};
use wayfarer_web::AppState;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Load settings from `path`, then apply environment and flag overrides.
///
/// Precedence, lowest first: built-in defaults, the file, `WAYFARER_*`
/// variables, `--max-steps`.
pub fn load_settings(path: &Path, max_steps: Option<u32>) -> Result<Settings> {
    let mut settings = Settings::load(path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    settings
        .apply_env()
        .context("invalid WAYFARER_* environment override")?;
    if let Some(max_steps) = max_steps {
        settings.agent.max_steps = max_steps;
    }
    settings.validate().context("invalid settings")?;

    info!(
        agent = %settings.agent.name,
        max_steps = settings.agent.max_steps,
        model = %settings.llm.model,
        "settings resolved"
    );
    Ok(settings)
}

// ---------------------------------------------------------------------------
// Agent construction
// ---------------------------------------------------------------------------

/// Build the model backend described by `settings`, with request logging.
pub fn build_backend(settings: &Settings) -> Result<Arc<dyn ModelBackend>> {
    let config = settings.llm_client_config().with_context(|| {
        format!(
            "no API key found, set {} (or change llm.api_key_env)",
            settings.llm.api_key_env
        )
    })?;
    let client = LlmClient::new(config).context("failed to create LLM client")?;
    Ok(Arc::new(LoggingBackend::new(client)))
}

/// Tools offered to the model, as enabled in `[tools]`.
pub fn tool_catalog(settings: &Settings) -> Result<ToolCatalog> {
    let catalog = settings
        .tool_catalog()
        .context("failed to build tool catalog")?;
    info!(tools = ?catalog, output_dir = %settings.tools.output_dir.display(), "tools ready");
    Ok(catalog)
}

/// Build web state that hands out agents configured from `settings`.
pub fn app_state(settings: &Settings, llm: Arc<dyn ModelBackend>) -> Result<AppState> {
    let mut state = AppState::new(llm, tool_catalog(settings)?, settings.agent_config()?);
    state.model = settings.llm.model.clone();
    state.temperature = settings.llm.temperature;
    Ok(state)
}

/// Build a single idle agent.
pub fn build_agent(settings: &Settings, llm: Arc<dyn ModelBackend>) -> Result<Agent<ReactCycle>> {
    Ok(app_state(settings, llm)?.build_agent())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_overrides_file_budget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wayfarer.toml");
        std::fs::write(&path, "[agent]\nmax_steps = 4\n").unwrap();

        assert_eq!(load_settings(&path, None).unwrap().agent.max_steps, 4);
        assert_eq!(load_settings(&path, Some(9)).unwrap().agent.max_steps, 9);
    }

    #[test]
    fn malformed_file_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[agent\n").unwrap();

        let err = load_settings(&path, None).unwrap_err();
        assert!(format!("{err:#}").contains("broken.toml"));
    }

    #[test]
    fn catalog_offers_builtin_tools_and_termination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wayfarer.toml");
        std::fs::write(&path, "[tools]\npdf = false\n").unwrap();

        let catalog = tool_catalog(&load_settings(&path, None).unwrap()).unwrap();
        assert!(catalog.get("query_weather").is_some());
        assert!(catalog.get("generate_pdf").is_none());
        assert!(catalog.get(wayfarer_agent::TERMINATE_TOOL_NAME).is_some());
    }
}
