//! PostgreSQL implementation of ConversationRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, instrument};

use carechat_core::traits::{ConversationRepository, RepoResult};
use carechat_core::{Conversation, ConversationKey, DomainError, LastMessage, Snowflake};

use crate::models::ConversationModel;

use super::error::{conversation_not_found, map_db_error};

/// PostgreSQL implementation of ConversationRepository
#[derive(Clone)]
pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    #[instrument(skip(self))]
    async fn find_or_create(
        &self,
        a: Snowflake,
        b: Snowflake,
        new_id: Snowflake,
        now: DateTime<Utc>,
    ) -> RepoResult<(Conversation, bool)> {
        let key = ConversationKey::for_pair(a, b)?;

        if let Some(existing) = self.find_by_key(&key).await? {
            return Ok((existing, false));
        }

        let (first, second) = key.participants();
        let inserted = sqlx::query_as::<_, ConversationModel>(
            r#"
            INSERT INTO conversations (id, conversation_key, participants, chat_type, started_at, last_activity)
            VALUES ($1, $2, $3, 'direct', $4, $4)
            ON CONFLICT (conversation_key) DO NOTHING
            RETURNING id, conversation_key, participants, chat_type, last_message,
                      unread_counts, muted, pinned, is_active, started_at, last_activity
            "#,
        )
        .bind(new_id.into_inner())
        .bind(key.as_str())
        .bind(vec![first.into_inner(), second.into_inner()])
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        match inserted {
            Some(model) => Ok((Conversation::try_from(model)?, true)),
            None => {
                // Lost the race to a concurrent first message; the winner's row exists now
                debug!(key = %key, "conversation created concurrently, re-reading");
                let existing = self.find_by_key(&key).await?.ok_or_else(|| {
                    DomainError::Storage(format!("conversation {key} vanished after conflict"))
                })?;
                Ok((existing, false))
            }
        }
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Conversation>> {
        let result = sqlx::query_as::<_, ConversationModel>(
            r#"
            SELECT id, conversation_key, participants, chat_type, last_message,
                   unread_counts, muted, pinned, is_active, started_at, last_activity
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(Conversation::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_key(&self, key: &ConversationKey) -> RepoResult<Option<Conversation>> {
        let result = sqlx::query_as::<_, ConversationModel>(
            r#"
            SELECT id, conversation_key, participants, chat_type, last_message,
                   unread_counts, muted, pinned, is_active, started_at, last_activity
            FROM conversations
            WHERE conversation_key = $1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(Conversation::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_user(&self, user_id: Snowflake) -> RepoResult<Vec<Conversation>> {
        let results = sqlx::query_as::<_, ConversationModel>(
            r#"
            SELECT id, conversation_key, participants, chat_type, last_message,
                   unread_counts, muted, pinned, is_active, started_at, last_activity
            FROM conversations
            WHERE $1 = ANY(participants) AND is_active
            ORDER BY last_activity DESC
            "#,
        )
        .bind(user_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        results.into_iter().map(Conversation::try_from).collect()
    }

    #[instrument(skip(self, snapshot))]
    async fn update_last_message(
        &self,
        id: Snowflake,
        snapshot: &LastMessage,
        now: DateTime<Utc>,
    ) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE conversations
            SET last_message = $2, last_activity = $3, is_active = TRUE
            WHERE id = $1
            "#,
        )
        .bind(id.into_inner())
        .bind(Json(snapshot))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(conversation_not_found(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn increment_unread(&self, id: Snowflake, participant: Snowflake) -> RepoResult<i64> {
        // Single statement so concurrent senders never lose an increment
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE conversations
            SET unread_counts = jsonb_set(
                unread_counts,
                ARRAY[$2::text],
                to_jsonb(COALESCE((unread_counts ->> $2::text)::bigint, 0) + 1)
            )
            WHERE id = $1
            RETURNING (unread_counts ->> $2::text)::bigint
            "#,
        )
        .bind(id.into_inner())
        .bind(participant.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        count.ok_or_else(|| conversation_not_found(id))
    }

    #[instrument(skip(self))]
    async fn reset_unread(&self, id: Snowflake, participant: Snowflake) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE conversations
            SET unread_counts = jsonb_set(unread_counts, ARRAY[$2::text], '0'::jsonb)
            WHERE id = $1
            "#,
        )
        .bind(id.into_inner())
        .bind(participant.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(conversation_not_found(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn toggle_mute(&self, id: Snowflake, participant: Snowflake) -> RepoResult<bool> {
        let flag = sqlx::query_scalar::<_, bool>(
            r#"
            UPDATE conversations
            SET muted = jsonb_set(
                muted,
                ARRAY[$2::text],
                to_jsonb(NOT COALESCE((muted ->> $2::text)::boolean, FALSE))
            )
            WHERE id = $1
            RETURNING (muted ->> $2::text)::boolean
            "#,
        )
        .bind(id.into_inner())
        .bind(participant.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        flag.ok_or_else(|| conversation_not_found(id))
    }

    #[instrument(skip(self))]
    async fn toggle_pin(&self, id: Snowflake, participant: Snowflake) -> RepoResult<bool> {
        let flag = sqlx::query_scalar::<_, bool>(
            r#"
            UPDATE conversations
            SET pinned = jsonb_set(
                pinned,
                ARRAY[$2::text],
                to_jsonb(NOT COALESCE((pinned ->> $2::text)::boolean, FALSE))
            )
            WHERE id = $1
            RETURNING (pinned ->> $2::text)::boolean
            "#,
        )
        .bind(id.into_inner())
        .bind(participant.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        flag.ok_or_else(|| conversation_not_found(id))
    }

    #[instrument(skip(self))]
    async fn set_active(&self, id: Snowflake, active: bool) -> RepoResult<()> {
        let result = sqlx::query("UPDATE conversations SET is_active = $2 WHERE id = $1")
            .bind(id.into_inner())
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(conversation_not_found(id));
        }
        Ok(())
    }
}
