use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use parley_core::turn::{AgentId, CallerId, ConversationId, MessageRole};

pub mod conversation;
pub mod memory;
pub mod message;

pub use conversation::SqlConversationRepository;
pub use memory::{InMemoryConversationRepository, InMemoryMessageRepository};
pub use message::SqlMessageRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub agent_id: AgentId,
    pub caller_id: CallerId,
    pub thread_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(agent_id: AgentId, caller_id: CallerId) -> Self {
        Self {
            id: ConversationId::new(),
            agent_id,
            caller_id,
            thread_id: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRecord {
    pub conversation_id: ConversationId,
    pub role: MessageRole,
    pub body: String,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationRecord>, RepositoryError>;

    async fn create(&self, record: ConversationRecord) -> Result<(), RepositoryError>;

    /// Stores the engine thread id after the first successful turn so later
    /// turns reuse the remote thread.
    async fn attach_thread(
        &self,
        id: &ConversationId,
        thread_id: &str,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(&self, record: MessageRecord) -> Result<(), RepositoryError>;

    async fn list_for_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Vec<MessageRecord>, RepositoryError>;
}
