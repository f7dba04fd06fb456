use chrono::DateTime;
use sqlx::Row;
use uuid::Uuid;

use parley_core::turn::{ConversationId, MessageRole};

use super::{MessageRecord, MessageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_role(raw: &str) -> Result<MessageRole, RepositoryError> {
    match raw {
        "user" => Ok(MessageRole::User),
        "assistant" => Ok(MessageRole::Assistant),
        other => Err(RepositoryError::Decode(format!("unknown message role `{other}`"))),
    }
}

fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<MessageRecord, RepositoryError> {
    let conversation_id: String = row.get("conversation_id");
    let conversation_id = Uuid::parse_str(&conversation_id).map_err(|error| {
        RepositoryError::Decode(format!("message conversation_id `{conversation_id}`: {error}"))
    })?;
    let role: String = row.get("role");
    let created_at: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|error| {
            RepositoryError::Decode(format!("message created_at `{created_at}`: {error}"))
        })?
        .with_timezone(&chrono::Utc);

    Ok(MessageRecord {
        conversation_id: ConversationId(conversation_id),
        role: decode_role(&role)?,
        body: row.get("body"),
        language: row.get("language"),
        created_at,
    })
}

#[async_trait::async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn append(&self, record: MessageRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO message (conversation_id, role, body, language, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(record.conversation_id.to_string())
        .bind(record.role.as_str())
        .bind(&record.body)
        .bind(&record.language)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Vec<MessageRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT conversation_id, role, body, language, created_at \
             FROM message WHERE conversation_id = ?1 ORDER BY id ASC",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_row).collect()
    }
}
