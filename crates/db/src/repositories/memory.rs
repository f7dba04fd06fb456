//! In-memory repository doubles for tests and scaffolding.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use parley_core::turn::ConversationId;

use super::{
    ConversationRecord, ConversationRepository, MessageRecord, MessageRepository, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: Mutex<HashMap<ConversationId, ConversationRecord>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationRecord>, RepositoryError> {
        Ok(self.conversations.lock().expect("lock poisoned").get(id).cloned())
    }

    async fn create(&self, record: ConversationRecord) -> Result<(), RepositoryError> {
        self.conversations.lock().expect("lock poisoned").insert(record.id.clone(), record);
        Ok(())
    }

    async fn attach_thread(
        &self,
        id: &ConversationId,
        thread_id: &str,
    ) -> Result<(), RepositoryError> {
        if let Some(record) = self.conversations.lock().expect("lock poisoned").get_mut(id) {
            record.thread_id = Some(thread_id.to_string());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: Mutex<Vec<MessageRecord>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(&self, record: MessageRecord) -> Result<(), RepositoryError> {
        self.messages.lock().expect("lock poisoned").push(record);
        Ok(())
    }

    async fn list_for_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Vec<MessageRecord>, RepositoryError> {
        Ok(self
            .messages
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|record| record.conversation_id == *id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use parley_core::turn::{AgentId, CallerId, MessageRole};

    use super::*;

    #[tokio::test]
    async fn in_memory_doubles_mirror_the_sql_contract() {
        let conversations = InMemoryConversationRepository::new();
        let messages = InMemoryMessageRepository::new();
        let record =
            ConversationRecord::new(AgentId("agent-1".to_string()), CallerId("caller-1".to_string()));

        conversations.create(record.clone()).await.expect("create");
        conversations.attach_thread(&record.id, "thread-1").await.expect("attach");
        messages
            .append(MessageRecord {
                conversation_id: record.id.clone(),
                role: MessageRole::User,
                body: "hello".to_string(),
                language: Some("en".to_string()),
                created_at: Utc::now(),
            })
            .await
            .expect("append");

        let found = conversations.find_by_id(&record.id).await.expect("find").expect("exists");
        assert_eq!(found.thread_id.as_deref(), Some("thread-1"));
        assert_eq!(messages.list_for_conversation(&record.id).await.expect("list").len(), 1);
    }
}
