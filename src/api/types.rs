//! API request and response types

use serde::{Deserialize, Serialize};

use crate::db::Row;
use crate::session::Message;

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub message: String,
}

/// Role/content view of a stored message
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}

pub fn simplify(messages: &[Message]) -> Vec<ChatMessage> {
    messages.iter().map(ChatMessage::from).collect()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub reply: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ConversationCreateResponse {
    pub id: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ConversationHistoryResponse {
    pub id: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DeleteResponse {
    pub status: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SqlPreviewRequest {
    pub sql: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SqlPreviewResponse {
    pub rows: Vec<Row>,
    pub markdown: String,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub db: String,
    pub agent: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SchemaResponse {
    pub schema_hint: String,
}

/// Error returned to HTTP clients
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: u16,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(400, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(404, detail)
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(422, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(500, detail)
    }

    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({ "detail": self.detail })
    }
}
