//! Warehouse connection pool and statement execution
//!
//! rusqlite is synchronous, so every statement runs on the blocking pool
//! with a connection checked out of r2d2. A statement that outlives the
//! query timeout is interrupted so its connection returns to the pool.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::ValueRef;
use rusqlite::{InterruptHandle, OpenFlags};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::agent::guard::VettedSql;
use crate::error::{AgentError, Result};

/// One result row, column name to scalar, in select-list order
pub type Row = Map<String, Value>;

/// Execution limits for the warehouse
#[derive(Debug, Clone)]
pub struct WarehouseOptions {
    pub pool_size: u32,
    pub query_timeout: Duration,
    pub max_rows: usize,
}

impl Default for WarehouseOptions {
    fn default() -> Self {
        Self {
            pool_size: 4,
            query_timeout: Duration::from_secs(30),
            max_rows: 500,
        }
    }
}

#[derive(Clone)]
pub struct Warehouse {
    pool: Pool<SqliteConnectionManager>,
    options: WarehouseOptions,
}

/// Cancellation shared between a running statement and the task awaiting it
#[derive(Default)]
struct QueryCancel {
    state: Mutex<CancelState>,
}

#[derive(Default)]
struct CancelState {
    handle: Option<InterruptHandle>,
    cancelled: bool,
}

impl QueryCancel {
    /// Register the connection about to run; false if the caller already gave up
    fn arm(&self, handle: InterruptHandle) -> bool {
        match self.state.lock() {
            Ok(mut state) if !state.cancelled => {
                state.handle = Some(handle);
                true
            }
            _ => false,
        }
    }

    fn cancel(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.cancelled = true;
            if let Some(handle) = state.handle.take() {
                handle.interrupt();
            }
        }
    }
}

impl Warehouse {
    /// Open a read-only pool over the warehouse file
    pub fn open<P: AsRef<Path>>(path: P, options: WarehouseOptions) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(AgentError::Connectivity(format!(
                "Warehouse file not found at {:?}",
                path
            )));
        }

        let manager = SqliteConnectionManager::file(path).with_flags(
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        );

        let pool = Pool::builder()
            .max_size(options.pool_size.max(1))
            .test_on_check_out(true)
            .connection_timeout(options.query_timeout)
            .build(manager)
            .map_err(|e| {
                AgentError::Connectivity(format!("Failed to open warehouse at {:?}: {}", path, e))
            })?;

        info!("Warehouse pool opened at {:?}", path);

        Ok(Self { pool, options })
    }

    /// Round-trip a trivial statement; used at startup where failure is fatal
    pub async fn ping(&self) -> Result<()> {
        let rows = self.query("SELECT 1 AS one").await?;
        let one = rows.first().and_then(|r| r.get("one")).cloned();
        info!("Warehouse connection works. Test query returned: {:?}", one);
        Ok(())
    }

    /// Check if the warehouse is reachable (for health checks)
    pub async fn health_check(&self) -> bool {
        match self.query("SELECT 1").await {
            Ok(_) => true,
            Err(e) => {
                warn!("Warehouse health check failed: {}", e);
                false
            }
        }
    }

    /// Execute a guarded statement and materialize its rows
    pub async fn run_sql(&self, sql: &VettedSql) -> Result<Vec<Row>> {
        self.query(sql.as_str()).await
    }

    /// Execute trusted, internally-authored SQL
    pub(crate) async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        let pool = self.pool.clone();
        let sql_owned = sql.to_string();
        let max_rows = self.options.max_rows;
        let timeout = self.options.query_timeout;

        let cancel = Arc::new(QueryCancel::default());
        let task_cancel = cancel.clone();

        let task = tokio::task::spawn_blocking(move || {
            execute(&pool, &sql_owned, max_rows, &task_cancel)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(AgentError::Execution(format!(
                "Query task failed: {}",
                join_err
            ))),
            Err(_) => {
                cancel.cancel();
                warn!("Warehouse query interrupted after {}s", timeout.as_secs());
                Err(AgentError::Timeout(timeout.as_secs(), "warehouse query".to_string()))
            }
        }
    }
}

fn execute(
    pool: &Pool<SqliteConnectionManager>,
    sql: &str,
    max_rows: usize,
    cancel: &QueryCancel,
) -> Result<Vec<Row>> {
    let conn = pool
        .get()
        .map_err(|e| AgentError::Connectivity(format!("No warehouse connection available: {}", e)))?;

    if !cancel.arm(conn.get_interrupt_handle()) {
        return Err(AgentError::Execution("Query cancelled before it started".to_string()));
    }

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| AgentError::Execution(e.to_string()))?;

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut rows = stmt
        .query([])
        .map_err(|e| AgentError::Execution(e.to_string()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(|e| AgentError::Execution(e.to_string()))? {
        if out.len() >= max_rows {
            warn!("Result truncated at {} rows", max_rows);
            break;
        }
        let mut record = Map::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            let value = row
                .get_ref(i)
                .map_err(|e| AgentError::Execution(e.to_string()))?;
            record.insert(name.clone(), to_json(value));
        }
        out.push(record);
    }

    Ok(out)
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}
