//! HTTP gateway for submitting user turns.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use parley_agent::{OrchestrationError, TurnDriver};
use parley_core::turn::{AgentId, CallerId, ConversationId, TurnRequest};
use parley_db::repositories::{ConversationRecord, ConversationRepository, RepositoryError};

#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<dyn TurnDriver>,
    pub conversations: Arc<dyn ConversationRepository>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub conversation_id: Option<Uuid>,
    pub caller_id: String,
    pub agent_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub conversation_id: Uuid,
    pub tools_invoked: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown conversation `{0}`")]
    UnknownConversation(ConversationId),
    #[error(transparent)]
    Turn(#[from] OrchestrationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownConversation(_) => StatusCode::NOT_FOUND,
            Self::Turn(OrchestrationError::Invalid(_)) => StatusCode::BAD_REQUEST,
            Self::Turn(OrchestrationError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Turn(_) => StatusCode::BAD_GATEWAY,
            Self::Repository(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::UnknownConversation(id) => format!("conversation `{id}` was not found"),
            Self::Turn(error) => error.user_message().to_string(),
            Self::Repository(_) => {
                "The assistant is temporarily unavailable. Please try again shortly.".to_string()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(
            event_name = "gateway.chat.rejected",
            status = %self.status_code(),
            error = %self,
            "chat request failed"
        );
        (self.status_code(), Json(ErrorBody { error: self.public_message() })).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/api/chat", post(chat)).with_state(state)
}

/// Resolves the conversation, drives the turn, and stores the engine thread
/// id after the first successful turn so later turns reuse the remote thread.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let mut request = TurnRequest {
        conversation_id: ConversationId::new(),
        thread_id: None,
        caller_id: CallerId(body.caller_id),
        agent_id: AgentId(body.agent_id),
        text: body.text,
    };
    // Reject malformed input before touching the database.
    request.validate().map_err(OrchestrationError::Invalid)?;

    let conversation = match body.conversation_id {
        Some(raw) => {
            let id = ConversationId(raw);
            state
                .conversations
                .find_by_id(&id)
                .await?
                .ok_or(ApiError::UnknownConversation(id))?
        }
        None => {
            let record =
                ConversationRecord::new(request.agent_id.clone(), request.caller_id.clone());
            state.conversations.create(record.clone()).await?;
            record
        }
    };

    request.conversation_id = conversation.id.clone();
    request.thread_id = conversation.thread_id.clone();

    let outcome = state.driver.run_turn(request).await?;

    if conversation.thread_id.is_none() {
        // The reply already exists; losing the thread id only costs the next
        // turn its remote context, so log and answer anyway.
        if let Err(error) =
            state.conversations.attach_thread(&conversation.id, &outcome.thread_id).await
        {
            warn!(
                event_name = "gateway.chat.thread_attach_failed",
                conversation_id = %conversation.id,
                error = %error,
                "failed to store engine thread id"
            );
        }
    }

    info!(
        event_name = "gateway.chat.completed",
        conversation_id = %conversation.id,
        language = outcome.language.code(),
        tools = ?outcome.tools_invoked,
        "turn completed"
    );

    Ok(Json(ChatResponse {
        reply: outcome.reply_text,
        conversation_id: conversation.id.0,
        tools_invoked: outcome.tools_invoked,
    }))
}
