//! Application state

use std::sync::Arc;
use std::time::Duration;

use crate::agent::{Orchestrator, OrchestratorOptions, ToolRegistry};
use crate::config::AppConfig;
use crate::db::{SchemaContext, Warehouse, WarehouseOptions};
use crate::error::{AgentError, Result};
use crate::llm::{ModelProvider, OpenAiProvider};
use crate::session::ConversationManager;

/// Everything a request handler needs, built once at startup
pub struct AppState {
    pub warehouse: Warehouse,
    pub schema: Arc<SchemaContext>,
    pub sessions: Arc<ConversationManager>,
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Validate config, connect to the warehouse, and build the schema context
    ///
    /// Any failure here is fatal: the caller should exit before serving.
    pub async fn initialize(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let path = config
            .resolve_warehouse_path()
            .map_err(|e| AgentError::Configuration(e.to_string()))?;
        let warehouse = Warehouse::open(&path, warehouse_options(config))?;
        warehouse.ping().await?;

        let provider = Arc::new(OpenAiProvider::from_config(&config.model));
        Self::with_provider(config, warehouse, provider).await
    }

    /// Build state around an existing warehouse and model provider
    pub async fn with_provider(
        config: &AppConfig,
        warehouse: Warehouse,
        provider: Arc<dyn ModelProvider>,
    ) -> Result<Self> {
        let schema = Arc::new(SchemaContext::build(&warehouse, &config.allowed_tables).await?);
        let sessions = Arc::new(ConversationManager::in_memory());
        let registry = ToolRegistry::new(warehouse.clone(), schema.clone());

        let orchestrator = Orchestrator::new(
            provider,
            registry,
            sessions.clone(),
            &schema,
            OrchestratorOptions {
                max_tool_cycles: config.agent.max_tool_cycles,
                model_timeout: Duration::from_secs(config.model.timeout_secs),
            },
        );

        tracing::info!("Agent ready with model {}", orchestrator.model_name());

        Ok(Self {
            warehouse,
            schema,
            sessions,
            orchestrator,
        })
    }
}

pub fn warehouse_options(config: &AppConfig) -> WarehouseOptions {
    WarehouseOptions {
        pool_size: config.agent.pool_size,
        query_timeout: Duration::from_secs(config.agent.query_timeout_secs),
        max_rows: config.agent.max_rows,
    }
}
