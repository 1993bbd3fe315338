//! Configuration management for Stepwise
//!
//! Loads and saves agent parameters from `~/.stepwise/config.json`. Every field
//! has a default, so a partial or missing file still yields a usable config.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir, expand_tilde, threads_dir, workspace_path};

/// Environment variables consulted, in order, when no key is configured
pub const API_KEY_ENV_VARS: &[&str] = &["STEPWISE_API_KEY", "DEEPSEEK_API_KEY"];

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config not found: {0}")]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Inference service endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// Agent loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    #[serde(default = "default_workspace")]
    pub workspace: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Model calls allowed per plan step before falling back
    #[serde(default = "default_executor_max_iterations")]
    pub executor_max_iterations: u32,
    /// Deadline for a single tool invocation
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// Node executions allowed per turn
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: u32,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            executor_max_iterations: default_executor_max_iterations(),
            tool_timeout_secs: default_tool_timeout_secs(),
            recursion_limit: default_recursion_limit(),
        }
    }
}

fn default_workspace() -> String {
    "~/.stepwise/workspace".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.0
}

fn default_executor_max_iterations() -> u32 {
    5
}

fn default_tool_timeout_secs() -> u64 {
    60
}

fn default_recursion_limit() -> u32 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentConfig {
    #[serde(default)]
    pub defaults: AgentDefaults,
}

/// External MCP server to spawn as the capability provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Capability provider selection
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CapabilityConfig {
    /// Absent means the builtin tools run in-process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
}

/// Conversation thread settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadConfig {
    #[serde(default = "default_thread")]
    pub default_thread: String,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            default_thread: default_thread(),
        }
    }
}

fn default_thread() -> String {
    "default".to_string()
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub capabilities: CapabilityConfig,
    #[serde(default)]
    pub threads: ThreadConfig,
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from a specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("loading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to a specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("saving config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Workspace with `~` expanded
    pub fn workspace_path(&self) -> PathBuf {
        expand_tilde(&self.agent.defaults.workspace)
    }

    /// API key from config, falling back to the environment
    pub fn api_key(&self) -> Option<String> {
        self.resolve_api_key(|name| std::env::var(name).ok())
    }

    /// API key resolution with an injectable environment lookup
    pub fn resolve_api_key(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        if !self.provider.api_key.is_empty() {
            return Some(self.provider.api_key.clone());
        }

        API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| env(name))
            .find(|key| !key.is_empty())
    }

    pub fn api_base(&self) -> Option<String> {
        self.provider.api_base.clone().filter(|b| !b.is_empty())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn default_model(&self) -> String {
        self.agent.defaults.model.clone()
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.agent.defaults.tool_timeout_secs)
    }

    pub fn executor_max_iterations(&self) -> u32 {
        self.agent.defaults.executor_max_iterations
    }

    pub fn recursion_limit(&self) -> u32 {
        self.agent.defaults.recursion_limit
    }

    pub fn default_thread(&self) -> String {
        self.threads.default_thread.clone()
    }
}

/// Create the config file (if missing) and the workspace
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("config already exists at {:?}", config_path);
    } else {
        let config = Config::default();
        config.save().await?;
        info!("created config at {:?}", config_path);
    }

    let config = Config::load().await?;
    let workspace = config.workspace_path();
    tokio::fs::create_dir_all(&workspace).await?;
    info!("workspace ready at {:?}", workspace);

    Ok(config)
}
