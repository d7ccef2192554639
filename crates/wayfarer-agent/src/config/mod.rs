//! File and environment configuration.
//!
//! [`Settings`] is the on-disk format (TOML, or JSON when the file ends in
//! `.json`).  Every field has a default, so an empty or missing file yields a
//! working configuration.  Environment variables override file values:
//!
//! | Variable                        | Overrides                    |
//! |---------------------------------|------------------------------|
//! | `WAYFARER_MAX_STEPS`            | `agent.max_steps`            |
//! | `WAYFARER_STREAM_TIMEOUT_SECS`  | `agent.stream_timeout_secs`  |
//! | `WAYFARER_MODEL`                | `llm.model`                  |
//! | `WAYFARER_BASE_URL`             | `llm.base_url`               |
//!
//! | `WAYFARER_OUTPUT_DIR`           | `tools.output_dir`           |
//!
//! The API key itself is never stored in the file; it is read from the
//! variable named by `llm.api_key_env`.

pub mod presets;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::agent::{AgentConfig, ArtifactMarker, DEFAULT_CANCEL_GRACE, DEFAULT_STREAM_TIMEOUT};
use crate::error::{AgentError, Result};
use crate::llm::LlmClientConfig;
use crate::llm::client::OPENAI_BASE_URL;
use crate::tools::{PdfTool, Tool, ToolCatalog, WeatherTool};

/// Top-level settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Agent loop settings.
    pub agent: AgentSettings,
    /// Model backend settings.
    pub llm: LlmSettings,
    /// Built-in tool settings.
    pub tools: ToolSettings,
}

/// The `[agent]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub name: String,
    pub system_prompt: String,
    pub next_step_prompt: Option<String>,
    pub max_steps: u32,
    pub stream_timeout_secs: u64,
    /// Seconds an interrupted streaming step may keep running.
    pub cancel_grace_secs: u64,
    pub artifact_marker: ArtifactMarker,
}

impl Default for AgentSettings {
    fn default() -> Self {
        let preset = presets::travel_planner();
        Self {
            name: preset.name,
            system_prompt: preset.system_prompt,
            next_step_prompt: preset.next_step_prompt,
            max_steps: preset.max_steps,
            stream_timeout_secs: DEFAULT_STREAM_TIMEOUT.as_secs(),
            cancel_grace_secs: DEFAULT_CANCEL_GRACE.as_secs(),
            artifact_marker: ArtifactMarker::default(),
        }
    }
}

/// The `[llm]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: OPENAI_BASE_URL.into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// The `[tools]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Offer the weather forecast tool.
    pub weather: bool,
    /// Offer the PDF export tool.
    pub pdf: bool,
    /// Directory PDF exports are written to.
    pub output_dir: PathBuf,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            weather: true,
            pdf: true,
            output_dir: PathBuf::from("tmp/pdf"),
        }
    }
}

impl Settings {
    /// Load settings from `path`.
    ///
    /// A missing file is not an error: defaults are returned and a warning
    /// is logged.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = ?path, "configuration file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| AgentError::ConfigError {
            reason: format!("failed to read config file: {e}"),
        })?;

        let settings = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(|e| AgentError::ConfigError {
                reason: format!("failed to parse JSON config: {e}"),
            })?
        } else {
            Self::from_toml_str(&content)?
        };

        info!(path = ?path, "configuration loaded from file");
        Ok(settings)
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AgentError::ConfigError {
            reason: format!("failed to parse TOML config: {e}"),
        })
    }

    /// Apply `WAYFARER_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` to read variables.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("WAYFARER_MAX_STEPS") {
            self.agent.max_steps = parse_var("WAYFARER_MAX_STEPS", &v)?;
        }
        if let Some(v) = lookup("WAYFARER_STREAM_TIMEOUT_SECS") {
            self.agent.stream_timeout_secs = parse_var("WAYFARER_STREAM_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("WAYFARER_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = lookup("WAYFARER_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = lookup("WAYFARER_OUTPUT_DIR") {
            self.tools.output_dir = PathBuf::from(v);
        }
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_steps == 0 {
            return Err(AgentError::ConfigError {
                reason: "agent.max_steps must be at least 1".into(),
            });
        }
        if self.agent.stream_timeout_secs == 0 {
            return Err(AgentError::ConfigError {
                reason: "agent.stream_timeout_secs must be at least 1".into(),
            });
        }
        if self.llm.model.trim().is_empty() {
            return Err(AgentError::ConfigError {
                reason: "llm.model must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Build the agent configuration.
    pub fn agent_config(&self) -> Result<AgentConfig> {
        self.validate()?;
        Ok(AgentConfig {
            name: self.agent.name.clone(),
            system_prompt: self.agent.system_prompt.clone(),
            next_step_prompt: self.agent.next_step_prompt.clone(),
            max_steps: self.agent.max_steps,
            stream_timeout: Duration::from_secs(self.agent.stream_timeout_secs),
            cancel_grace: Duration::from_secs(self.agent.cancel_grace_secs),
            artifact_marker: self.agent.artifact_marker.clone(),
        })
    }

    /// Build the catalog of enabled built-in tools.  The termination tool
    /// is always included.
    pub fn tool_catalog(&self) -> Result<ToolCatalog> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        if self.tools.weather {
            tools.push(Arc::new(WeatherTool::new()?));
        }
        if self.tools.pdf {
            tools.push(Arc::new(PdfTool::new(
                &self.tools.output_dir,
                self.agent.artifact_marker.clone(),
            )));
        }
        ToolCatalog::new(tools)
    }

    /// Build the model client configuration, reading the API key from the
    /// environment.
    pub fn llm_client_config(&self) -> Result<LlmClientConfig> {
        let api_key = std::env::var(&self.llm.api_key_env).unwrap_or_default();
        self.llm_client_config_with_key(api_key)
    }

    /// Build the model client configuration with an explicit API key.
    pub fn llm_client_config_with_key(&self, api_key: impl Into<String>) -> Result<LlmClientConfig> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: format!("{} (set {})", self.llm.base_url, self.llm.api_key_env),
            });
        }
        let mut config =
            LlmClientConfig::openai_compatible(api_key, &self.llm.model, &self.llm.base_url);
        if let Some(max_tokens) = self.llm.max_tokens {
            config.max_tokens = max_tokens;
        }
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| AgentError::ConfigError {
        reason: format!("invalid value for {key}: {value}"),
    })
}
