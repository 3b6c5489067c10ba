// Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use olist_agent::config::AppConfig;
use olist_agent::core::AppState;
use olist_agent::db::{Warehouse, WarehouseOptions};
use olist_agent::error::Result;
use olist_agent::llm::{ModelProvider, ToolSpec};
use olist_agent::session::{Message, Role, ToolCall};
use rusqlite::Connection;
use tempfile::TempDir;

const FIXTURE_SQL: &str = "
CREATE TABLE customers (
    customer_id TEXT PRIMARY KEY,
    customer_unique_id TEXT NOT NULL,
    customer_zip_code_prefix INTEGER,
    customer_city TEXT,
    customer_state TEXT
);
INSERT INTO customers VALUES
    ('c1', 'u1', 14409, 'franca', 'SP'),
    ('c2', 'u1', 14409, 'franca', 'SP'),
    ('c3', 'u2', 22775, 'rio de janeiro', 'RJ'),
    ('c4', 'u3', 1151, 'sao paulo', 'SP');

CREATE TABLE orders (
    order_id TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL,
    order_status TEXT,
    order_purchase_timestamp TEXT
);
INSERT INTO orders VALUES
    ('o1', 'c1', 'delivered', '2017-10-02 10:56:33'),
    ('o2', 'c2', 'delivered', '2018-07-24 20:41:37'),
    ('o3', 'c3', 'canceled', '2018-08-08 08:38:49'),
    ('o4', 'c4', 'delivered', '2017-11-18 19:28:06');

CREATE TABLE order_items (order_id TEXT, order_item_id INTEGER, product_id TEXT, seller_id TEXT, price REAL, freight_value REAL);
INSERT INTO order_items VALUES ('o1', 1, 'p1', 's1', 29.99, 8.72), ('o2', 1, 'p2', 's1', 118.7, 22.76);

CREATE TABLE order_payments (order_id TEXT, payment_type TEXT, payment_value REAL);
CREATE TABLE order_reviews (review_id TEXT, order_id TEXT, review_score INTEGER);
CREATE TABLE products (product_id TEXT PRIMARY KEY, product_category_name TEXT);
INSERT INTO products VALUES ('p1', 'utilidades_domesticas'), ('p2', 'perfumaria');
CREATE TABLE sellers (seller_id TEXT PRIMARY KEY, seller_city TEXT, seller_state TEXT);
CREATE TABLE geolocation (geolocation_zip_code_prefix INTEGER, geolocation_lat REAL, geolocation_lng REAL);
CREATE TABLE product_category_name_translation (product_category_name TEXT, product_category_name_english TEXT);
CREATE TABLE internal_notes (note TEXT);
";

/// Build a small Olist-shaped warehouse in a temp directory
pub fn fixture_warehouse() -> (Warehouse, TempDir) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("olist.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(FIXTURE_SQL).unwrap();
    drop(conn);

    let warehouse = Warehouse::open(&path, WarehouseOptions::default()).unwrap();
    (warehouse, dir)
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.model.api_key = "sk-test".to_string();
    config.model.timeout_secs = 5;
    config.agent.max_tool_cycles = 3;
    config
}

pub async fn test_state(config: &AppConfig, provider: Arc<ScriptedProvider>) -> (AppState, TempDir) {
    let (warehouse, dir) = fixture_warehouse();
    let state = AppState::with_provider(config, warehouse, provider)
        .await
        .unwrap();
    (state, dir)
}

type Responder = Box<dyn Fn(&[Message], usize) -> Result<Message> + Send + Sync>;

/// Model double driven by a closure over the prompt and call index
pub struct ScriptedProvider {
    responder: Responder,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&[Message], usize) -> Result<Message> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            delay: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Reply with each message in turn, repeating the last one
    pub fn sequence(replies: Vec<Message>) -> Arc<Self> {
        Self::new(move |_, i| Ok(replies[i.min(replies.len() - 1)].clone()))
    }

    pub fn slow<F>(delay: Duration, responder: F) -> Arc<Self>
    where
        F: Fn(&[Message], usize) -> Result<Message> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message> {
        assert_eq!(tools.len(), 4, "every tool should be offered to the model");
        assert_eq!(messages[0].role, Role::System);

        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(messages.to_vec());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(messages, index)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub fn tool_call(id: &str, tool: &str, sql: &str) -> Message {
    Message::assistant_with_tools("", vec![ToolCall::with_sql(id, tool, sql)])
}

/// Value in the first data row of a single-column markdown table
pub fn first_cell(table: &str) -> Option<String> {
    table
        .lines()
        .nth(2)
        .map(|l| l.trim().trim_matches('|').trim().to_string())
}
