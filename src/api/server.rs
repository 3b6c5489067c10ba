//! Minimal HTTP/1.1 JSON server

use std::sync::Arc;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::handlers;
use super::types::ApiError;
use crate::core::AppState;

const MAX_REQUEST_BYTES: usize = 1024 * 1024;

pub struct ApiServer {
    host: String,
    port: u16,
    state: Arc<AppState>,
}

/// A parsed request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    fn ok<T: Serialize>(value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::from(ApiError::internal(format!("Failed to encode response: {}", e))),
        }
    }
}

impl From<ApiError> for HttpResponse {
    fn from(err: ApiError) -> Self {
        Self {
            status: err.status,
            body: err.body(),
        }
    }
}

impl ApiServer {
    pub fn new(host: impl Into<String>, port: u16, state: Arc<AppState>) -> Self {
        Self {
            host: host.into(),
            port,
            state,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("API server listening on {}", addr);

        Self::serve(listener, self.state.clone()).await
    }

    /// Accept connections on an already-bound listener
    pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
        loop {
            let (stream, addr) = listener.accept().await?;
            tracing::debug!("Accepted connection from {}", addr);

            let state = state.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, state).await {
                    tracing::error!("Error handling connection: {}", e);
                }
            });
        }
    }

    async fn handle_connection(mut stream: TcpStream, state: Arc<AppState>) -> Result<()> {
        let response = match read_request(&mut stream).await? {
            Ok(request) => {
                tracing::debug!("{} {}", request.method, request.path);
                route(&state, &request).await
            }
            Err(err) => HttpResponse::from(err),
        };

        send_response(&mut stream, &response).await
    }
}

/// Read one request, honouring Content-Length
async fn read_request(stream: &mut TcpStream) -> Result<std::result::Result<HttpRequest, ApiError>> {
    let mut buffer = Vec::with_capacity(8192);
    let mut chunk = vec![0u8; 8192];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        if buffer.len() > MAX_REQUEST_BYTES {
            return Ok(Err(ApiError::new(413, "Request too large")));
        }

        if let Some(header_end) = find_header_end(&buffer) {
            let head = String::from_utf8_lossy(&buffer[..header_end]);
            let expected = header_end + 4 + content_length(&head);
            if buffer.len() >= expected {
                break;
            }
        }
    }

    Ok(parse_request(&String::from_utf8_lossy(&buffer))
        .ok_or_else(|| ApiError::bad_request("Invalid HTTP request")))
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Split a raw request into method, path, and body
pub fn parse_request(raw: &str) -> Option<HttpRequest> {
    let (head, body) = match raw.split_once("\r\n\r\n") {
        Some(parts) => parts,
        None => raw.split_once("\n\n")?,
    };

    let request_line = head.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_uppercase();
    let target = parts.next()?;
    let path = target.split('?').next().unwrap_or(target);

    Some(HttpRequest {
        method,
        path: path.trim_end_matches('/').to_string(),
        body: body.to_string(),
    })
}

/// Map a request to its handler
pub async fn route(state: &AppState, request: &HttpRequest) -> HttpResponse {
    let segments: Vec<&str> = request.path.split('/').filter(|s| !s.is_empty()).collect();

    match (request.method.as_str(), segments.as_slice()) {
        ("GET", []) => HttpResponse::ok(json!({ "msg": "Olist Agent API is running" })),

        ("POST", ["chat", "v1", "conversations"]) => {
            respond(handlers::create_conversation(state).await)
        }
        ("GET", ["chat", "v1", "conversations", id]) => {
            respond(handlers::get_conversation(state, id).await)
        }
        ("DELETE", ["chat", "v1", "conversations", id]) => {
            respond(handlers::delete_conversation(state, id).await)
        }
        ("POST", ["chat", "v1", "chat"]) => match parse_body(&request.body) {
            Ok(req) => respond(handlers::chat(state, req).await),
            Err(e) => e.into(),
        },

        ("POST", ["sql", "v1", "sql", "preview"]) => match parse_body(&request.body) {
            Ok(req) => respond(handlers::sql_preview(state, req).await),
            Err(e) => e.into(),
        },

        ("GET", ["meta", "healthz"]) => HttpResponse::ok(handlers::healthz(state).await),
        ("GET", ["meta", "v1", "schema"]) => HttpResponse::ok(handlers::schema(state)),

        (_, path) if is_known_path(path) => ApiError::new(405, "Method not allowed").into(),
        _ => ApiError::not_found("Not found").into(),
    }
}

fn is_known_path(segments: &[&str]) -> bool {
    matches!(
        segments,
        [] | ["chat", "v1", "conversations"]
            | ["chat", "v1", "conversations", _]
            | ["chat", "v1", "chat"]
            | ["sql", "v1", "sql", "preview"]
            | ["meta", "healthz"]
            | ["meta", "v1", "schema"]
    )
}

fn respond<T: Serialize>(result: handlers::HandlerResult<T>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::ok(value),
        Err(e) => e.into(),
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> std::result::Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        503 => "Service Unavailable",
        _ => "Internal Server Error",
    }
}

async fn send_response(stream: &mut TcpStream, response: &HttpResponse) -> Result<()> {
    let body = serde_json::to_string(&response.body)?;
    tracing::debug!("Sending {}: {}", response.status, body);

    let http_response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nAccess-Control-Allow-Origin: *\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        reason(response.status),
        body.len(),
        body
    );

    stream.write_all(http_response.as_bytes()).await?;
    stream.flush().await?;

    Ok(())
}
