//! SQL implementation of the orchestrator's turn-persistence seam.

use async_trait::async_trait;
use chrono::Utc;

use parley_core::turn::{ConversationId, MessageRole, TurnStore};
use parley_core::PersistenceError;

use crate::repositories::{MessageRecord, MessageRepository, SqlMessageRepository};
use crate::DbPool;

pub struct SqlTurnStore {
    messages: SqlMessageRepository,
}

impl SqlTurnStore {
    pub fn new(pool: DbPool) -> Self {
        Self { messages: SqlMessageRepository::new(pool) }
    }

    async fn record(
        &self,
        conversation_id: &ConversationId,
        role: MessageRole,
        text: &str,
    ) -> Result<(), PersistenceError> {
        self.messages
            .append(MessageRecord {
                conversation_id: conversation_id.clone(),
                role,
                body: text.to_string(),
                language: None,
                created_at: Utc::now(),
            })
            .await
            .map_err(|error| PersistenceError(error.to_string()))
    }
}

#[async_trait]
impl TurnStore for SqlTurnStore {
    async fn record_user_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<(), PersistenceError> {
        self.record(conversation_id, MessageRole::User, text).await
    }

    async fn record_assistant_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<(), PersistenceError> {
        self.record(conversation_id, MessageRole::Assistant, text).await
    }
}
