use chrono::DateTime;
use sqlx::Row;
use uuid::Uuid;

use parley_core::turn::{AgentId, CallerId, ConversationId};

use super::{ConversationRecord, ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationRecord, RepositoryError> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id)
        .map_err(|error| RepositoryError::Decode(format!("conversation id `{id}`: {error}")))?;
    let created_at: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|error| {
            RepositoryError::Decode(format!("conversation created_at `{created_at}`: {error}"))
        })?
        .with_timezone(&chrono::Utc);

    Ok(ConversationRecord {
        id: ConversationId(id),
        agent_id: AgentId(row.get("agent_id")),
        caller_id: CallerId(row.get("caller_id")),
        thread_id: row.get("thread_id"),
        created_at,
    })
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, agent_id, caller_id, thread_id, created_at \
             FROM conversation WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn create(&self, record: ConversationRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO conversation (id, agent_id, caller_id, thread_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(record.id.to_string())
        .bind(&record.agent_id.0)
        .bind(&record.caller_id.0)
        .bind(&record.thread_id)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn attach_thread(
        &self,
        id: &ConversationId,
        thread_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE conversation SET thread_id = ?2 WHERE id = ?1")
            .bind(id.to_string())
            .bind(thread_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
