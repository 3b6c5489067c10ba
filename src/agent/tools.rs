//! Domain-scoped SQL tools and dispatch

use std::sync::Arc;

use serde_json::json;

use super::guard::clean_and_correct_sql;
use crate::db::{format_rows, SchemaContext, Warehouse};
use crate::error::{AgentError, Result};
use crate::llm::ToolSpec;
use crate::session::ToolCall;

/// The closed set of tools offered to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    Sales,
    Customers,
    Logistics,
    General,
}

impl ToolId {
    pub const ALL: [ToolId; 4] = [
        ToolId::Sales,
        ToolId::Customers,
        ToolId::Logistics,
        ToolId::General,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolId::Sales => "sales_node_sql",
            ToolId::Customers => "customers_node_sql",
            ToolId::Logistics => "logistics_node_sql",
            ToolId::General => "general_sql",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolId::Sales => "For sales, revenue, product, and seller analytics. Use tables: orders, order_items, order_payments, products, sellers. Input is a single SELECT/WITH statement.",
            ToolId::Customers => "For customer details, reviews, and geographic questions. Use tables: customers, orders, order_reviews, geolocation. Input is a single SELECT/WITH statement.",
            ToolId::Logistics => "For shipping, delivery times, freight, and seller locations. Use tables: orders, order_items, sellers, geolocation. Input is a single SELECT/WITH statement.",
            ToolId::General => "For general SQL queries over the Olist schema when other tools are not specific enough. Input is a single SELECT/WITH statement.",
        }
    }

    /// Advisory scope; queries outside it are logged, not blocked
    pub fn allowed_tables(&self) -> &'static [&'static str] {
        match self {
            ToolId::Sales => &["orders", "order_items", "order_payments", "products", "sellers"],
            ToolId::Customers => &["customers", "orders", "order_reviews", "geolocation"],
            ToolId::Logistics => &["orders", "order_items", "sellers", "geolocation"],
            ToolId::General => &crate::config::DEFAULT_ALLOWED_TABLES,
        }
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "sql": {
                        "type": "string",
                        "description": "A single read-only SELECT/WITH statement"
                    }
                },
                "required": ["sql"]
            }),
        }
    }
}

/// Binds every tool to the guard and the warehouse
#[derive(Clone)]
pub struct ToolRegistry {
    warehouse: Warehouse,
    schema: Arc<SchemaContext>,
}

impl ToolRegistry {
    pub fn new(warehouse: Warehouse, schema: Arc<SchemaContext>) -> Self {
        Self { warehouse, schema }
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        ToolId::ALL.iter().map(ToolId::spec).collect()
    }

    /// Resolve and run a tool call, always producing result text
    pub async fn dispatch(&self, call: &ToolCall) -> String {
        let Some(tool) = ToolId::from_name(&call.name) else {
            let err = AgentError::Dispatch(format!(
                "Unknown tool '{}'. Available tools: {}",
                call.name,
                ToolId::ALL.map(|t| t.name()).join(", ")
            ));
            tracing::warn!("{}", err);
            return format!("Error executing tool {}: {}", call.name, err);
        };

        match call.sql() {
            Ok(sql) => self.run(tool, &sql).await,
            Err(err) => {
                tracing::warn!("{}", err);
                format!("Error executing tool {}: {}", call.name, err)
            }
        }
    }

    /// Guard, execute, and format one statement for a tool
    pub async fn run(&self, tool: ToolId, sql: &str) -> String {
        if !references_any(sql, tool.allowed_tables()) {
            tracing::warn!(
                "Query may be out-of-scope for '{}'. Allowed tables: {:?}",
                tool.name(),
                tool.allowed_tables()
            );
        }

        match self.execute(sql).await {
            Ok(table) => table,
            Err(e) => format!(
                "[ERROR] SQL failed: {}\n\n--- Schema reference ---\n{}",
                e, self.schema
            ),
        }
    }

    async fn execute(&self, sql: &str) -> Result<String> {
        let vetted = clean_and_correct_sql(sql)?;
        let rows = self.warehouse.run_sql(&vetted).await?;
        tracing::debug!("Query returned {} rows", rows.len());
        Ok(format_rows(&rows))
    }
}

fn references_any(sql: &str, tables: &[&str]) -> bool {
    let low = sql.to_lowercase();
    tables.iter().any(|t| low.contains(t))
}
