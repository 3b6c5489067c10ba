//! Schema context: correction rules plus the warehouse column catalog,
//! built once at startup and shared read-only

use std::fmt;

use serde_json::Value;

use super::connection::{Row, Warehouse};
use crate::error::{AgentError, Result};

pub const SCHEMA_RULES: &str = "Rules:
- Use exact column names from the schema below.
- For customer counts, use COUNT(DISTINCT customer_unique_id).
- Join orders->customers on orders.customer_id = customers.customer_id.
- Use customers.customer_state and customers.customer_city (not 'state' or 'city').
- Return only a single SELECT/WITH statement.
";

/// One row per column of every user table, in declaration order
const CATALOG_SQL: &str = "
SELECT m.name AS table_name, p.name AS column_name, p.type AS data_type
FROM sqlite_master AS m
JOIN pragma_table_info(m.name) AS p
WHERE m.type IN ('table', 'view') AND m.name NOT LIKE 'sqlite_%'
ORDER BY m.name, p.cid
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaContext {
    catalog: String,
    text: String,
}

impl SchemaContext {
    /// Introspect the warehouse catalog, keeping only allow-listed tables
    pub async fn build(warehouse: &Warehouse, allowed_tables: &[String]) -> Result<Self> {
        let rows = warehouse.query(CATALOG_SQL).await.map_err(|e| match e {
            AgentError::Execution(msg) => {
                AgentError::Connectivity(format!("Catalog introspection failed: {}", msg))
            }
            other => other,
        })?;

        let context = Self::from_catalog_rows(&rows, allowed_tables);
        if context.catalog.is_empty() {
            tracing::warn!("No allow-listed tables found in the warehouse catalog");
        }
        Ok(context)
    }

    /// Group `(table_name, column_name, data_type)` rows into one line per table
    pub fn from_catalog_rows(rows: &[Row], allowed_tables: &[String]) -> Self {
        let mut tables: Vec<(String, Vec<String>)> = Vec::new();

        for row in rows {
            let (Some(table), Some(column)) = (text(row, "table_name"), text(row, "column_name"))
            else {
                continue;
            };
            if !allowed_tables.iter().any(|t| t.as_str() == table) {
                continue;
            }
            let data_type = text(row, "data_type")
                .filter(|t| !t.is_empty())
                .unwrap_or("unknown");
            let column = format!("{} ({})", column, data_type.to_lowercase());

            match tables.iter_mut().find(|(name, _)| name.as_str() == table) {
                Some((_, columns)) => columns.push(column),
                None => tables.push((table.to_string(), vec![column])),
            }
        }

        let catalog = tables
            .iter()
            .map(|(table, cols)| format!("{}: {}", table, cols.join(", ")))
            .collect::<Vec<_>>()
            .join("\n");

        Self::new(catalog)
    }

    pub fn new(catalog: impl Into<String>) -> Self {
        let catalog = catalog.into();
        let text = format!("{}\n--- SCHEMA ---\n{}", SCHEMA_RULES, catalog);
        Self { catalog, text }
    }

    /// Full text handed to the model
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn catalog(&self) -> &str {
        &self.catalog
    }
}

impl fmt::Display for SchemaContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn text<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}
