//! Agent configuration management
//! Handles loading the YAML config file and applying environment overrides

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AgentError;

/// Tables the agent is permitted to reference
pub const DEFAULT_ALLOWED_TABLES: [&str; 9] = [
    "customers",
    "geolocation",
    "sellers",
    "products",
    "product_category_name_translation",
    "orders",
    "order_items",
    "order_payments",
    "order_reviews",
];

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite warehouse file
    #[serde(default = "default_warehouse_path")]
    pub warehouse_path: String,

    /// Model service settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Orchestration and execution limits
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Allow-listed warehouse tables
    #[serde(default = "default_allowed_tables")]
    pub allowed_tables: Vec<String>,
}

fn default_warehouse_path() -> String {
    "~/.olist-agent/olist.db".to_string()
}

fn default_allowed_tables() -> Vec<String> {
    DEFAULT_ALLOWED_TABLES.iter().map(|t| t.to_string()).collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            warehouse_path: default_warehouse_path(),
            model: ModelConfig::default(),
            agent: AgentConfig::default(),
            server: ServerConfig::default(),
            allowed_tables: default_allowed_tables(),
        }
    }
}

/// Model service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API key; usually supplied through OPENAI_API_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

fn default_model_name() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model_timeout() -> u64 {
    60
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            name: default_model_name(),
            base_url: default_base_url(),
            temperature: 0.0,
            timeout_secs: default_model_timeout(),
        }
    }
}

/// Orchestrator and execution engine limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum ACT cycles within one turn
    #[serde(default = "default_max_tool_cycles")]
    pub max_tool_cycles: usize,
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
    /// Rows materialized per query before truncation
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_max_tool_cycles() -> usize {
    6
}

fn default_query_timeout() -> u64 {
    30
}

fn default_max_rows() -> usize {
    500
}

fn default_pool_size() -> u32 {
    4
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_cycles: default_max_tool_cycles(),
            query_timeout_secs: default_query_timeout(),
            max_rows: default_max_rows(),
            pool_size: default_pool_size(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    /// Load config from the default location or specified path, then apply
    /// `.env` and process environment overrides
    pub fn load(path: Option<&str>) -> Result<Self> {
        dotenv::dotenv().ok();

        let config_path = Self::config_path(path)?;

        let mut config = if config_path.exists() {
            let raw = fs::read_to_string(&config_path).context("Failed to read config file")?;
            let config = Self::from_yaml(&raw)?;
            debug!("Loaded config from {:?}", config_path);
            config
        } else {
            info!("Config file not found at {:?}, using defaults", config_path);
            AppConfig::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("Failed to parse config file")
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.model.api_key = key.trim().to_string();
        }
        if let Some(model) = lookup("OPENAI_MODEL").filter(|m| !m.trim().is_empty()) {
            self.model.name = model;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL").filter(|u| !u.trim().is_empty()) {
            self.model.base_url = url;
        }

        let warehouse = lookup("WAREHOUSE_PATH").or_else(|| lookup("DATABASE_URL"));
        if let Some(url) = warehouse.filter(|u| !u.trim().is_empty()) {
            self.warehouse_path = strip_sqlite_scheme(url.trim()).to_string();
        }
    }

    /// Startup check for required settings
    pub fn validate(&self) -> std::result::Result<(), AgentError> {
        if self.model.api_key.trim().is_empty() {
            return Err(AgentError::Configuration(
                "OPENAI_API_KEY is not set".to_string(),
            ));
        }
        if self.warehouse_path.trim().is_empty() {
            return Err(AgentError::Configuration(
                "DATABASE_URL / warehouse_path is not set".to_string(),
            ));
        }
        if self.agent.max_tool_cycles == 0 {
            return Err(AgentError::Configuration(
                "agent.max_tool_cycles must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the config file path
    fn config_path(path: Option<&str>) -> Result<PathBuf> {
        if let Some(p) = path {
            return Ok(PathBuf::from(p));
        }

        if let Ok(env_path) = std::env::var("OLIST_AGENT_CONFIG") {
            return Ok(PathBuf::from(env_path));
        }

        let home = dirs::home_dir().context("Cannot find home directory")?;
        Ok(home.join(".olist-agent").join("config.yml"))
    }

    /// Resolve warehouse path (expand ~)
    pub fn resolve_warehouse_path(&self) -> Result<PathBuf> {
        if !self.warehouse_path.starts_with('~') {
            return Ok(PathBuf::from(&self.warehouse_path));
        }
        let home = dirs::home_dir().context("Cannot find home directory")?;
        let path = self
            .warehouse_path
            .replacen('~', &home.to_string_lossy(), 1);
        Ok(PathBuf::from(path))
    }
}

fn strip_sqlite_scheme(url: &str) -> &str {
    url.strip_prefix("sqlite:///")
        .map(|rest| &url[url.len() - rest.len() - 1..])
        .or_else(|| url.strip_prefix("sqlite://"))
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}
