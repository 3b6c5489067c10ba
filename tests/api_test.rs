// Tests for the HTTP API

mod common;

use std::sync::Arc;

use common::{test_config, test_state, tool_call, ScriptedProvider};
use olist_agent::api::{route, ApiServer, HttpRequest};
use olist_agent::session::Message;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn request(method: &str, path: &str, body: Value) -> HttpRequest {
    HttpRequest {
        method: method.to_string(),
        path: path.to_string(),
        body: if body.is_null() { String::new() } else { body.to_string() },
    }
}

fn echo_provider() -> Arc<ScriptedProvider> {
    ScriptedProvider::sequence(vec![Message::assistant("Hi there.")])
}

#[tokio::test]
async fn test_conversation_lifecycle() {
    let (state, _dir) = test_state(&test_config(), echo_provider()).await;

    let created = route(&state, &request("POST", "/chat/v1/conversations", Value::Null)).await;
    assert_eq!(created.status, 200);
    let id = created.body["id"].as_str().unwrap().to_string();

    let path = format!("/chat/v1/conversations/{}", id);
    let fetched = route(&state, &request("GET", &path, Value::Null)).await;
    assert_eq!(fetched.status, 200);
    assert_eq!(fetched.body["messages"], json!([]));

    let deleted = route(&state, &request("DELETE", &path, Value::Null)).await;
    assert_eq!(deleted.body, json!({"status": "deleted"}));

    let missing = route(&state, &request("GET", &path, Value::Null)).await;
    assert_eq!(missing.status, 404);
    assert_eq!(missing.body["detail"], "Conversation not found");

    // Deleting again is still fine
    let again = route(&state, &request("DELETE", &path, Value::Null)).await;
    assert_eq!(again.status, 200);
}

#[tokio::test]
async fn test_chat_auto_creates_conversation() {
    let provider = ScriptedProvider::new(|_, i| match i {
        0 => Ok(tool_call("c1", "sales_node_sql", "SELECT COUNT(*) AS n FROM orders")),
        _ => Ok(Message::assistant("There are 4 orders.")),
    });
    let (state, _dir) = test_state(&test_config(), provider).await;

    let resp = route(
        &state,
        &request("POST", "/chat/v1/chat", json!({"message": "How many orders?"})),
    )
    .await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["reply"], "There are 4 orders.");
    let messages = resp.body["messages"].as_array().unwrap();
    let roles: Vec<&str> = messages.iter().map(|m| m["role"].as_str().unwrap()).collect();
    assert_eq!(roles, vec!["user", "assistant", "tool", "assistant"]);

    let id = resp.body["conversation_id"].as_str().unwrap();
    let history = route(
        &state,
        &request("GET", &format!("/chat/v1/conversations/{}", id), Value::Null),
    )
    .await;
    assert_eq!(history.body["messages"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_chat_rejects_bad_input() {
    let (state, _dir) = test_state(&test_config(), echo_provider()).await;

    let empty = route(&state, &request("POST", "/chat/v1/chat", json!({"message": "  "}))).await;
    assert_eq!(empty.status, 400);

    let malformed = HttpRequest {
        method: "POST".into(),
        path: "/chat/v1/chat".into(),
        body: "{not json".into(),
    };
    assert_eq!(route(&state, &malformed).await.status, 400);
}

#[tokio::test]
async fn test_sql_preview_statuses() {
    let (state, _dir) = test_state(&test_config(), echo_provider()).await;
    let path = "/sql/v1/sql/preview";

    let ok = route(
        &state,
        &request("POST", path, json!({"sql": "SELECT state, COUNT(*) AS n FROM customers GROUP BY state ORDER BY state"})),
    )
    .await;
    assert_eq!(ok.status, 200);
    assert_eq!(
        ok.body["rows"],
        json!([
            {"customer_state": "RJ", "n": 1},
            {"customer_state": "SP", "n": 2}
        ])
    );
    assert!(ok.body["markdown"].as_str().unwrap().starts_with("| customer_state | n |"));

    let rejected = route(&state, &request("POST", path, json!({"sql": "DROP TABLE orders"}))).await;
    assert_eq!(rejected.status, 400);

    let failed = route(&state, &request("POST", path, json!({"sql": "SELECT nope FROM orders"}))).await;
    assert_eq!(failed.status, 422);
    assert!(failed.body["detail"].as_str().unwrap().starts_with("SQL failed:"));
}

#[tokio::test]
async fn test_meta_routes() {
    let (state, _dir) = test_state(&test_config(), echo_provider()).await;

    let health = route(&state, &request("GET", "/meta/healthz", Value::Null)).await;
    assert_eq!(health.body, json!({"status": "ok", "db": "ok", "agent": "ok"}));

    let schema = route(&state, &request("GET", "/meta/v1/schema", Value::Null)).await;
    let hint = schema.body["schema_hint"].as_str().unwrap();
    assert!(hint.contains("order_items: order_id (text)"));
    assert!(!hint.contains("internal_notes"));
}

#[tokio::test]
async fn test_unknown_routes() {
    let (state, _dir) = test_state(&test_config(), echo_provider()).await;

    assert_eq!(route(&state, &request("GET", "/nope", Value::Null)).await.status, 404);
    assert_eq!(
        route(&state, &request("PUT", "/meta/healthz", Value::Null)).await.status,
        405
    );
    assert_eq!(route(&state, &request("GET", "", Value::Null)).await.status, 200);
}

#[tokio::test]
async fn test_server_over_tcp() {
    let (state, _dir) = test_state(&test_config(), echo_provider()).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(ApiServer::serve(listener, Arc::new(state)));

    let body = json!({"message": "hello"}).to_string();
    let raw = format!(
        "POST /chat/v1/chat HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK"));
    let (_, payload) = response.split_once("\r\n\r\n").unwrap();
    let payload: Value = serde_json::from_str(payload).unwrap();
    assert_eq!(payload["reply"], "Hi there.");
}
