//! OpenAI model provider implementation

use std::time::Duration;

use async_trait::async_trait;

use super::openai::client::{
    ChatCompletionRequest, OpenAiClient, WireFunction, WireFunctionCall, WireMessage, WireTool,
    WireToolCall,
};
use super::provider::{ModelProvider, ToolSpec};
use crate::config::ModelConfig;
use crate::error::Result;
use crate::session::{Message, Role, ToolCall};

pub struct OpenAiProvider {
    client: OpenAiClient,
    model: String,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(client: OpenAiClient, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        let client = OpenAiClient::new(
            &config.base_url,
            &config.api_key,
            Duration::from_secs(config.timeout_secs),
        );
        Self::new(client, &config.name, config.temperature)
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            messages: messages.iter().map(to_wire).collect(),
            tools: tools.iter().map(tool_to_wire).collect(),
        };

        let choice = self.client.chat_completion(&request).await?;
        tracing::debug!("Model finished with reason {:?}", choice.finish_reason);

        Ok(from_wire(choice.message))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn to_wire(message: &Message) -> WireMessage {
    let tool_calls = (!message.tool_calls.is_empty()).then(|| {
        message
            .tool_calls
            .iter()
            .map(|c| WireToolCall {
                id: c.id.clone(),
                call_type: "function".to_string(),
                function: WireFunctionCall {
                    name: c.name.clone(),
                    arguments: c.arguments.clone(),
                },
            })
            .collect()
    });

    // Assistant messages that only carry tool calls are sent with null content
    let content = if message.role == Role::Assistant
        && tool_calls.is_some()
        && message.content.is_empty()
    {
        None
    } else {
        Some(message.content.clone())
    };

    WireMessage {
        role: message.role.as_str().to_string(),
        content,
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

fn from_wire(message: WireMessage) -> Message {
    let content = message.content.unwrap_or_default();
    let tool_calls: Vec<ToolCall> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|c| ToolCall::new(c.id, c.function.name, c.function.arguments))
        .collect();

    if tool_calls.is_empty() {
        Message::assistant(content)
    } else {
        Message::assistant_with_tools(content, tool_calls)
    }
}

fn tool_to_wire(spec: &ToolSpec) -> WireTool {
    WireTool {
        tool_type: "function".to_string(),
        function: WireFunction {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.parameters.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_tool_call_message_has_null_content() {
        let msg = Message::assistant_with_tools(
            "",
            vec![ToolCall::with_sql("call_1", "general_sql", "SELECT 1")],
        );
        let wire = to_wire(&msg);
        assert_eq!(wire.role, "assistant");
        assert!(wire.content.is_none());
        assert_eq!(wire.tool_calls.unwrap()[0].function.name, "general_sql");
    }

    #[test]
    fn test_tool_result_carries_call_id() {
        let wire = to_wire(&Message::tool_result("call_1", "| n |"));
        assert_eq!(wire.role, "tool");
        assert_eq!(wire.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(wire.content.as_deref(), Some("| n |"));
    }

    #[test]
    fn test_from_wire_without_tools() {
        let msg = from_wire(WireMessage {
            role: "assistant".into(),
            content: Some("There are 96096 customers.".into()),
            tool_calls: None,
            tool_call_id: None,
        });
        assert_eq!(msg.role, Role::Assistant);
        assert!(!msg.has_tool_calls());
    }
}
