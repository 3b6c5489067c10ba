//! Operation handlers behind the HTTP routes

use crate::agent::clean_and_correct_sql;
use crate::core::AppState;
use crate::db::format_rows;
use crate::error::AgentError;

use super::types::*;

pub type HandlerResult<T> = std::result::Result<T, ApiError>;

pub async fn create_conversation(state: &AppState) -> HandlerResult<ConversationCreateResponse> {
    let id = state.sessions.create().await.map_err(internal)?;
    Ok(ConversationCreateResponse { id })
}

pub async fn get_conversation(
    state: &AppState,
    id: &str,
) -> HandlerResult<ConversationHistoryResponse> {
    match state.sessions.fetch(id).await {
        Ok(conversation) => Ok(ConversationHistoryResponse {
            id: conversation.id,
            messages: simplify(&conversation.messages),
        }),
        Err(AgentError::NotFound(_)) => Err(ApiError::not_found("Conversation not found")),
        Err(e) => Err(internal(e)),
    }
}

pub async fn delete_conversation(state: &AppState, id: &str) -> HandlerResult<DeleteResponse> {
    state.sessions.delete(id).await.map_err(internal)?;
    Ok(DeleteResponse {
        status: "deleted".to_string(),
    })
}

pub async fn chat(state: &AppState, request: ChatRequest) -> HandlerResult<ChatResponse> {
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let outcome = state
        .orchestrator
        .run_turn(request.conversation_id.as_deref(), &request.message)
        .await
        .map_err(|e| {
            tracing::error!("Agent failed: {}", e);
            if e.is_retryable() {
                ApiError::new(503, format!("Agent temporarily unavailable: {}", e))
            } else {
                ApiError::internal(format!("Agent failed: {}", e))
            }
        })?;

    Ok(ChatResponse {
        conversation_id: outcome.conversation_id,
        reply: outcome.reply,
        messages: simplify(&outcome.messages),
    })
}

/// Guard and execute a statement directly, bypassing the model
pub async fn sql_preview(
    state: &AppState,
    request: SqlPreviewRequest,
) -> HandlerResult<SqlPreviewResponse> {
    let vetted = clean_and_correct_sql(&request.sql)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let rows = state
        .warehouse
        .run_sql(&vetted)
        .await
        .map_err(|e| ApiError::unprocessable(format!("SQL failed: {}", e)))?;

    let markdown = format_rows(&rows);
    Ok(SqlPreviewResponse { rows, markdown })
}

pub async fn healthz(state: &AppState) -> HealthResponse {
    let db_ok = state.warehouse.health_check().await;
    // Only confirms a model is configured; the provider is not called
    let agent_ok = !state.orchestrator.model_name().is_empty();

    HealthResponse {
        status: if db_ok && agent_ok { "ok" } else { "degraded" }.to_string(),
        db: status_word(db_ok),
        agent: status_word(agent_ok),
    }
}

pub fn schema(state: &AppState) -> SchemaResponse {
    SchemaResponse {
        schema_hint: state.schema.as_str().to_string(),
    }
}

fn status_word(ok: bool) -> String {
    if ok { "ok" } else { "fail" }.to_string()
}

fn internal(e: AgentError) -> ApiError {
    ApiError::internal(e.to_string())
}
