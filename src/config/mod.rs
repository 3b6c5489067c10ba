//! Agent configuration module
//! Handles loading config from YAML, `.env`, and the environment

pub mod config;

pub use config::{AgentConfig, AppConfig, ModelConfig, ServerConfig, DEFAULT_ALLOWED_TABLES};
