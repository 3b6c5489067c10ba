//! Turn orchestrator: alternates model decisions with tool execution
//!
//! Each turn is a small state machine. `Decide` asks the model for the next
//! assistant message, `Act` runs the tool calls it requested, and `Done`
//! hands the final reply back to the caller. Every step is appended to the
//! conversation as it happens, so a failed turn leaves a readable history.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::tools::ToolRegistry;
use crate::db::SchemaContext;
use crate::error::{AgentError, Result};
use crate::llm::{ModelProvider, ToolSpec};
use crate::session::{ConversationManager, Message, ToolCall};

pub const BUDGET_EXCEEDED_REPLY: &str =
    "Tool-call budget exceeded for this question. Please narrow the question or ask again.";

const SYSTEM_PREAMBLE: &str = "You are an expert SQL analyst for the Olist database.
When you use a tool, pass ONLY a valid SQL query as the `sql` parameter. Use table/column names exactly as in the schema reference below. For counts of customers, ALWAYS use COUNT(DISTINCT customer_unique_id). After receiving a result from a tool, summarize it in a clear, natural language answer to the user.

";

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Maximum ACT cycles per turn
    pub max_tool_cycles: usize,
    pub model_timeout: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            max_tool_cycles: 6,
            model_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
enum TurnState {
    Decide,
    Act(Vec<ToolCall>),
    Done(String),
}

/// Result of one user turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub conversation_id: String,
    pub reply: String,
    pub messages: Vec<Message>,
    pub decide_steps: usize,
    pub act_steps: usize,
    pub budget_exceeded: bool,
}

pub struct Orchestrator {
    provider: Arc<dyn ModelProvider>,
    registry: ToolRegistry,
    sessions: Arc<ConversationManager>,
    system_message: Message,
    tool_specs: Vec<ToolSpec>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        registry: ToolRegistry,
        sessions: Arc<ConversationManager>,
        schema: &SchemaContext,
        options: OrchestratorOptions,
    ) -> Self {
        let system_message = Message::system(format!("{}{}", SYSTEM_PREAMBLE, schema));
        let tool_specs = registry.specs();
        Self {
            provider,
            registry,
            sessions,
            system_message,
            tool_specs,
            options,
        }
    }

    pub fn sessions(&self) -> &Arc<ConversationManager> {
        &self.sessions
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Run one user turn, creating the conversation if needed
    pub async fn run_turn(&self, conversation_id: Option<&str>, text: &str) -> Result<TurnOutcome> {
        let id = self.sessions.ensure(conversation_id).await?;
        let _turn = self.sessions.lock(&id).await;

        self.sessions.append(&id, vec![Message::user(text)]).await?;

        let mut state = TurnState::Decide;
        let mut decide_steps = 0;
        let mut act_steps = 0;
        let mut budget_exceeded = false;

        let reply = loop {
            state = match state {
                TurnState::Decide => {
                    decide_steps += 1;
                    let message = self.decide(&id).await?;

                    if !message.has_tool_calls() {
                        let reply = message.content.clone();
                        self.sessions.append(&id, vec![message]).await?;
                        TurnState::Done(reply)
                    } else if act_steps >= self.options.max_tool_cycles {
                        warn!(
                            "Conversation {} exceeded {} tool cycles",
                            id, self.options.max_tool_cycles
                        );
                        budget_exceeded = true;
                        self.close_over_budget(&id, message).await?;
                        TurnState::Done(BUDGET_EXCEEDED_REPLY.to_string())
                    } else {
                        let calls = message.tool_calls.clone();
                        self.sessions.append(&id, vec![message]).await?;
                        TurnState::Act(calls)
                    }
                }
                TurnState::Act(calls) => {
                    act_steps += 1;
                    let results = self.act(&calls).await;
                    self.sessions.append(&id, results).await?;
                    TurnState::Decide
                }
                TurnState::Done(reply) => break reply,
            };
        };

        info!(
            "Turn finished for {}: {} decide, {} act steps",
            id, decide_steps, act_steps
        );

        let messages = self.sessions.fetch(&id).await?.messages;
        Ok(TurnOutcome {
            conversation_id: id,
            reply,
            messages,
            decide_steps,
            act_steps,
            budget_exceeded,
        })
    }

    async fn decide(&self, id: &str) -> Result<Message> {
        let history = self.sessions.fetch(id).await?.messages;

        let mut prompt = Vec::with_capacity(history.len() + 1);
        prompt.push(self.system_message.clone());
        prompt.extend(history);

        debug!("Calling model with {} messages", prompt.len());

        let timeout = self.options.model_timeout;
        match tokio::time::timeout(timeout, self.provider.complete(&prompt, &self.tool_specs)).await
        {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(timeout.as_secs(), "model call".to_string())),
        }
    }

    async fn act(&self, calls: &[ToolCall]) -> Vec<Message> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            debug!("Calling tool {} ({})", call.name, call.id);
            let content = self.registry.dispatch(call).await;
            results.push(Message::tool_result(&call.id, content));
        }
        results
    }

    /// Record the refused request, answer each of its calls, and close the turn
    async fn close_over_budget(&self, id: &str, message: Message) -> Result<()> {
        let skipped: Vec<Message> = message
            .tool_calls
            .iter()
            .map(|c| Message::tool_result(&c.id, "Skipped: tool-call budget exceeded."))
            .collect();

        let mut entries = Vec::with_capacity(skipped.len() + 2);
        entries.push(message);
        entries.extend(skipped);
        entries.push(Message::assistant(BUDGET_EXCEEDED_REPLY));
        self.sessions.append(id, entries).await
    }
}
