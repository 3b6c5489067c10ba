//! Model provider trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::Message;

/// Model backend that can decide between answering and calling tools
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Produce the next assistant message for the given history
    ///
    /// `messages` already starts with the system instruction.
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message>;

    /// Model identifier, for logging
    fn model_name(&self) -> &str;
}

/// Tool description surfaced to the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the argument object
    pub parameters: serde_json::Value,
}
