//! Message repository implementation
//!
//! The `seq` column is a BIGSERIAL, so the database assigns every message a
//! strictly increasing sequence number; per-conversation order falls out of
//! the global order.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::MessageRepository;
use crate::models::{ConversationId, Message};
use crate::utils::errors::Result;

const MESSAGE_COLUMNS: &str =
    "id, conversation_kind, conversation_id, seq, sender_id, sender_name, body, sent_at";

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn append(
        &self,
        conversation: ConversationId,
        sender_id: &str,
        sender_name: &str,
        body: &str,
    ) -> Result<Message> {
        let message = sqlx::query_as::<_, Message>(&format!(
            r#"
            INSERT INTO messages (id, conversation_kind, conversation_id, sender_id, sender_name, body, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(conversation.kind)
        .bind(conversation.id)
        .bind(sender_id)
        .bind(sender_name)
        .bind(body)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    async fn list_since(
        &self,
        conversation: ConversationId,
        after_seq: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE conversation_kind = $1 AND conversation_id = $2 AND seq > $3
            ORDER BY seq ASC
            LIMIT $4
            "#
        ))
        .bind(conversation.kind)
        .bind(conversation.id)
        .bind(after_seq.unwrap_or(0))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn latest_seq(&self, conversation: ConversationId) -> Result<Option<i64>> {
        let seq: (Option<i64>,) = sqlx::query_as(
            "SELECT MAX(seq) FROM messages WHERE conversation_kind = $1 AND conversation_id = $2",
        )
        .bind(conversation.kind)
        .bind(conversation.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(seq.0)
    }

    async fn purge_conversation(&self, conversation: ConversationId) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM read_positions WHERE conversation_kind = $1 AND conversation_id = $2",
        )
        .bind(conversation.kind)
        .bind(conversation.id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "DELETE FROM messages WHERE conversation_kind = $1 AND conversation_id = $2",
        )
        .bind(conversation.kind)
        .bind(conversation.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn set_read_position(
        &self,
        conversation: ConversationId,
        user_id: &str,
        seq: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO read_positions (conversation_kind, conversation_id, user_id, last_read_seq, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (conversation_kind, conversation_id, user_id)
            DO UPDATE SET
                last_read_seq = GREATEST(read_positions.last_read_seq, EXCLUDED.last_read_seq),
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(conversation.kind)
        .bind(conversation.id)
        .bind(user_id)
        .bind(seq)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn read_position(
        &self,
        conversation: ConversationId,
        user_id: &str,
    ) -> Result<Option<i64>> {
        let position: Option<(i64,)> = sqlx::query_as(
            "SELECT last_read_seq FROM read_positions WHERE conversation_kind = $1 AND conversation_id = $2 AND user_id = $3",
        )
        .bind(conversation.kind)
        .bind(conversation.id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(position.map(|(seq,)| seq))
    }

    async fn unread_count(&self, conversation: ConversationId, user_id: &str) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM messages m
            WHERE m.conversation_kind = $1 AND m.conversation_id = $2
              AND m.seq > COALESCE(
                  (SELECT last_read_seq FROM read_positions
                   WHERE conversation_kind = $1 AND conversation_id = $2 AND user_id = $3),
                  0)
            "#,
        )
        .bind(conversation.kind)
        .bind(conversation.id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }
}
