use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{PersistenceError, ValidationError};
use crate::language::Language;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One validated user message bound for the reasoning engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnRequest {
    pub conversation_id: ConversationId,
    pub thread_id: Option<String>,
    pub caller_id: CallerId,
    pub agent_id: AgentId,
    pub text: String,
}

impl TurnRequest {
    /// Rejects blank fields before anything is persisted or submitted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::MissingText);
        }
        if self.caller_id.0.trim().is_empty() {
            return Err(ValidationError::MissingCallerId);
        }
        if self.agent_id.0.trim().is_empty() {
            return Err(ValidationError::MissingAgentId);
        }
        Ok(())
    }
}

/// One completed exchange: the user message plus the assistant reply and the
/// capability calls made along the way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub conversation_id: ConversationId,
    pub user_text: String,
    pub language: Language,
    pub tools_invoked: Vec<String>,
    pub reply_text: String,
}

/// Persistence seam for conversation history.
///
/// Both operations are best-effort from the orchestrator's perspective:
/// a failure is logged and the turn continues, because the reasoning engine
/// keeps its own authoritative thread history remotely.
#[async_trait]
pub trait TurnStore: Send + Sync {
    async fn record_user_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<(), PersistenceError>;

    async fn record_assistant_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<(), PersistenceError>;
}

/// Store that records nothing. Used where history is intentionally off.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTurnStore;

#[async_trait]
impl TurnStore for NoopTurnStore {
    async fn record_user_message(
        &self,
        _conversation_id: &ConversationId,
        _text: &str,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn record_assistant_message(
        &self,
        _conversation_id: &ConversationId,
        _text: &str,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str, caller: &str, agent: &str) -> TurnRequest {
        TurnRequest {
            conversation_id: ConversationId::new(),
            thread_id: None,
            caller_id: CallerId(caller.to_string()),
            agent_id: AgentId(agent.to_string()),
            text: text.to_string(),
        }
    }

    #[test]
    fn well_formed_request_passes_validation() {
        assert_eq!(request("What are your hours?", "caller-1", "agent-1").validate(), Ok(()));
    }

    #[test]
    fn blank_text_is_rejected() {
        assert_eq!(
            request("   ", "caller-1", "agent-1").validate(),
            Err(ValidationError::MissingText)
        );
    }

    #[test]
    fn blank_caller_id_is_rejected() {
        assert_eq!(
            request("hello", "", "agent-1").validate(),
            Err(ValidationError::MissingCallerId)
        );
    }

    #[test]
    fn blank_agent_id_is_rejected() {
        assert_eq!(
            request("hello", "caller-1", " ").validate(),
            Err(ValidationError::MissingAgentId)
        );
    }
}
