use crate::db::models::DbMessage;
use crate::db::sqlite::GmaoStorage;
use crate::error::GmaoError;
use crate::types::domain::{Intent, Language, MessageRole};
use chrono::Utc;

impl GmaoStorage {
    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
        intent: Option<Intent>,
        language: Option<Language>,
    ) -> Result<i64, GmaoError> {
        let res = sqlx::query(
            r#"INSERT INTO conversation_messages (
                conversation_id, role, content, intent, language, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(conversation_id)
        .bind(role)
        .bind(content)
        .bind(intent)
        .bind(language)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    /// The last `limit` messages of a conversation, oldest first.
    pub async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: u32,
    ) -> Result<Vec<DbMessage>, GmaoError> {
        let mut rows = sqlx::query_as::<_, DbMessage>(
            r#"SELECT * FROM conversation_messages
               WHERE conversation_id = ?
               ORDER BY id DESC LIMIT ?"#,
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.reverse();
        Ok(rows)
    }

    pub async fn conversation(&self, conversation_id: &str) -> Result<Vec<DbMessage>, GmaoError> {
        let rows = sqlx::query_as::<_, DbMessage>(
            "SELECT * FROM conversation_messages WHERE conversation_id = ? ORDER BY id",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        if rows.is_empty() {
            return Err(GmaoError::NotFound("conversation"));
        }
        Ok(rows)
    }
}
