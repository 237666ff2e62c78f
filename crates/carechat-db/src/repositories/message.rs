//! PostgreSQL implementation of MessageRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::instrument;

use carechat_core::traits::{MessageQuery, MessageRepository, RepoResult};
use carechat_core::{ConversationKey, DomainError, Message, MessageStatus, MessageType, Snowflake};

use crate::models::{MessageModel, TypeCountModel};

use super::error::{map_db_error, message_not_found};

/// PostgreSQL implementation of MessageRepository
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
    #[instrument(skip(self, message), fields(message_id = %message.id))]
    async fn create(&self, message: &Message) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (
                id, conversation_id, conversation_key, sender_id, recipient_id, content,
                message_type, attachment, status, is_read, read_at, reply_to,
                is_edited, edited_at, original_content, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(message.id.into_inner())
        .bind(message.conversation_id.into_inner())
        .bind(message.conversation_key.as_str())
        .bind(message.sender_id.into_inner())
        .bind(message.recipient_id.into_inner())
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(message.attachment.as_ref().map(Json))
        .bind(message.status.as_str())
        .bind(message.is_read)
        .bind(message.read_at)
        .bind(message.reply_to.map(Snowflake::into_inner))
        .bind(message.is_edited)
        .bind(message.edited_at)
        .bind(message.original_content.as_deref())
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>> {
        let result = sqlx::query_as::<_, MessageModel>(
            r#"
            SELECT id, conversation_id, conversation_key, sender_id, recipient_id, content,
                   message_type, attachment, status, is_read, read_at, reply_to,
                   is_edited, edited_at, original_content, created_at, updated_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(Message::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_history(
        &self,
        key: &ConversationKey,
        query: MessageQuery,
    ) -> RepoResult<Vec<Message>> {
        let limit = query.limit.max(1);

        let results = match (query.before, query.after) {
            (before, Some(after)) => {
                // Reading forward from a cursor, bounded above by `before` if given
                sqlx::query_as::<_, MessageModel>(
                    r#"
                    SELECT id, conversation_id, conversation_key, sender_id, recipient_id, content,
                           message_type, attachment, status, is_read, read_at, reply_to,
                           is_edited, edited_at, original_content, created_at, updated_at
                    FROM messages
                    WHERE conversation_key = $1 AND id > $2
                      AND ($4::BIGINT IS NULL OR id < $4)
                    ORDER BY id ASC
                    LIMIT $3
                    "#,
                )
                .bind(key.as_str())
                .bind(after.into_inner())
                .bind(limit)
                .bind(before.map(Snowflake::into_inner))
                .fetch_all(&self.pool)
                .await
            }
            (Some(before), None) => {
                // Scrolling back: newest page below the cursor, flipped to chronological
                sqlx::query_as::<_, MessageModel>(
                    r#"
                    SELECT * FROM (
                        SELECT id, conversation_id, conversation_key, sender_id, recipient_id, content,
                               message_type, attachment, status, is_read, read_at, reply_to,
                               is_edited, edited_at, original_content, created_at, updated_at
                        FROM messages
                        WHERE conversation_key = $1 AND id < $2
                        ORDER BY id DESC
                        LIMIT $3
                    ) page
                    ORDER BY id ASC
                    "#,
                )
                .bind(key.as_str())
                .bind(before.into_inner())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            (None, None) => {
                sqlx::query_as::<_, MessageModel>(
                    r#"
                    SELECT * FROM (
                        SELECT id, conversation_id, conversation_key, sender_id, recipient_id, content,
                               message_type, attachment, status, is_read, read_at, reply_to,
                               is_edited, edited_at, original_content, created_at, updated_at
                        FROM messages
                        WHERE conversation_key = $1
                        ORDER BY id DESC
                        LIMIT $2
                    ) page
                    ORDER BY id ASC
                    "#,
                )
                .bind(key.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_db_error)?;

        results.into_iter().map(Message::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn count_in_conversation(&self, key: &ConversationKey) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE conversation_key = $1")
            .bind(key.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    #[instrument(skip(self))]
    async fn count_by_type(&self, key: &ConversationKey) -> RepoResult<Vec<(MessageType, i64)>> {
        let rows = sqlx::query_as::<_, TypeCountModel>(
            r#"
            SELECT message_type, COUNT(*) AS count
            FROM messages
            WHERE conversation_key = $1
            GROUP BY message_type
            ORDER BY message_type
            "#,
        )
        .bind(key.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter()
            .map(|row| {
                let kind = row
                    .message_type
                    .parse::<MessageType>()
                    .map_err(|e| DomainError::Storage(e.to_string()))?;
                Ok((kind, row.count))
            })
            .collect()
    }

    #[instrument(skip(self, message), fields(message_id = %message.id))]
    async fn update_content(&self, message: &Message) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET content = $2, is_edited = $3, edited_at = $4, original_content = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(message.id.into_inner())
        .bind(&message.content)
        .bind(message.is_edited)
        .bind(message.edited_at)
        .bind(message.original_content.as_deref())
        .bind(message.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(message_not_found(message.id));
        }
        Ok(())
    }

    #[instrument(skip(self, message), fields(message_id = %message.id, status = %message.status))]
    async fn update_status(&self, message: &Message, expected: MessageStatus) -> RepoResult<bool> {
        // Compare-and-set on the status read earlier, so a concurrent
        // mark-read is never rolled back
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = $2, is_read = $3, read_at = $4, updated_at = $5
            WHERE id = $1 AND status = $6
            "#,
        )
        .bind(message.id.into_inner())
        .bind(message.status.as_str())
        .bind(message.is_read)
        .bind(message.read_at)
        .bind(message.updated_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn mark_read_for_recipient(
        &self,
        key: &ConversationKey,
        recipient: Snowflake,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<Snowflake>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE messages
            SET is_read = TRUE, status = 'read', read_at = $3, updated_at = $3
            WHERE conversation_key = $1 AND recipient_id = $2 AND NOT is_read
            RETURNING id
            "#,
        )
        .bind(key.as_str())
        .bind(recipient.into_inner())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        let mut ids: Vec<Snowflake> = ids.into_iter().map(Snowflake::new).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Snowflake) -> RepoResult<bool> {
        // Reactions cascade, replies pointing here are nulled by the FK
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }
}
