//! Repository traits (ports) - define the interface for data access
//!
//! The domain layer defines what it needs, and the infrastructure layer
//! provides the implementation (Postgres in `carechat-db`, in-memory doubles
//! for tests).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{
    Conversation, LastMessage, Message, MessageStatus, MessageType, Reaction, User, UserRole,
};
use crate::error::DomainError;
use crate::value_objects::{ConversationKey, Snowflake};

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// Conversation Repository
// ============================================================================

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Look the pair up by its resolved key, inserting a fresh conversation with
    /// `new_id` when none exists. Concurrent first contact from both sides yields
    /// one record; the boolean is true only for the caller whose insert won.
    async fn find_or_create(
        &self,
        a: Snowflake,
        b: Snowflake,
        new_id: Snowflake,
        now: DateTime<Utc>,
    ) -> RepoResult<(Conversation, bool)>;

    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Conversation>>;

    async fn find_by_key(&self, key: &ConversationKey) -> RepoResult<Option<Conversation>>;

    /// Active conversations of a user, most recent activity first
    async fn find_by_user(&self, user_id: Snowflake) -> RepoResult<Vec<Conversation>>;

    /// Overwrite the last-message snapshot and bump last activity
    async fn update_last_message(
        &self,
        id: Snowflake,
        snapshot: &LastMessage,
        now: DateTime<Utc>,
    ) -> RepoResult<()>;

    /// Atomically add one to a participant's counter, returning the new value
    async fn increment_unread(&self, id: Snowflake, participant: Snowflake) -> RepoResult<i64>;

    async fn reset_unread(&self, id: Snowflake, participant: Snowflake) -> RepoResult<()>;

    /// Returns the new flag value
    async fn toggle_mute(&self, id: Snowflake, participant: Snowflake) -> RepoResult<bool>;

    /// Returns the new flag value
    async fn toggle_pin(&self, id: Snowflake, participant: Snowflake) -> RepoResult<bool>;

    /// Conversations are never hard-deleted, only flagged inactive
    async fn set_active(&self, id: Snowflake, active: bool) -> RepoResult<()>;
}

// ============================================================================
// Message Repository
// ============================================================================

/// Cursor pagination for history queries
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    pub before: Option<Snowflake>,
    pub after: Option<Snowflake>,
    pub limit: i64,
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: &Message) -> RepoResult<()>;

    /// Reactions are not loaded; see [`ReactionRepository`]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>>;

    /// One page of a conversation, always in chronological order.
    ///
    /// Without `after` this is the latest `limit` messages (optionally before a
    /// cursor); with `after` it reads forward from the cursor, stopping short
    /// of `before` when both are set. `limit` is taken as given; callers bound
    /// the page size.
    async fn find_history(
        &self,
        key: &ConversationKey,
        query: MessageQuery,
    ) -> RepoResult<Vec<Message>>;

    async fn count_in_conversation(&self, key: &ConversationKey) -> RepoResult<i64>;

    async fn count_by_type(&self, key: &ConversationKey) -> RepoResult<Vec<(MessageType, i64)>>;

    /// Persist content and edit metadata
    async fn update_content(&self, message: &Message) -> RepoResult<()>;

    /// Persist delivery status and read state, but only while the stored
    /// status is still `expected`. Returns `false` when the row moved on (or
    /// is gone) since it was read.
    async fn update_status(&self, message: &Message, expected: MessageStatus) -> RepoResult<bool>;

    /// Mark every unread message addressed to `recipient` as read. Best effort;
    /// returns the ids that changed.
    async fn mark_read_for_recipient(
        &self,
        key: &ConversationKey,
        recipient: Snowflake,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<Snowflake>>;

    /// Hard delete. Returns false if the message did not exist.
    async fn delete(&self, id: Snowflake) -> RepoResult<bool>;
}

// ============================================================================
// Reaction Repository
// ============================================================================

#[async_trait]
pub trait ReactionRepository: Send + Sync {
    /// Insert or replace the user's reaction on a message (last write wins)
    async fn upsert(&self, reaction: &Reaction) -> RepoResult<()>;

    /// Returns false if the user had no reaction
    async fn remove(&self, message_id: Snowflake, user_id: Snowflake) -> RepoResult<bool>;

    async fn list_for_message(&self, message_id: Snowflake) -> RepoResult<Vec<Reaction>>;

    async fn list_for_messages(&self, message_ids: &[Snowflake]) -> RepoResult<Vec<Reaction>>;
}

// ============================================================================
// User Directory (external, read-only)
// ============================================================================

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<User>>;

    async fn find_many(&self, ids: &[Snowflake]) -> RepoResult<Vec<User>>;

    /// Case-insensitive substring search over name, specialty and email
    async fn search(
        &self,
        query: &str,
        role: Option<UserRole>,
        exclude: Snowflake,
        limit: i64,
    ) -> RepoResult<Vec<User>>;

    /// Active users with one of `roles`, sorted by name
    async fn list_by_roles(&self, roles: &[UserRole], exclude: Snowflake) -> RepoResult<Vec<User>>;
}
