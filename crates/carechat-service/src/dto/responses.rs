//! Response DTOs for API endpoints and gateway payloads
//!
//! All response DTOs serialize as camelCase JSON. Snowflake IDs are
//! serialized as strings for JavaScript compatibility.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use carechat_core::{
    Attachment, ChatType, Conversation, LastMessage, Message, MessageStatus, MessageType,
    PresenceStatus, Reaction, Snowflake, User, UserRole,
};

// ============================================================================
// Common Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

// ============================================================================
// User Responses
// ============================================================================

/// Display fields of a directory user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Snowflake,
    pub display_name: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            role: user.role,
            avatar_url: user.avatar_url.clone(),
            specialty: user.specialty.clone(),
        }
    }
}

/// A user annotated with live presence
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPresence {
    #[serde(flatten)]
    pub user: UserSummary,
    pub status: PresenceStatus,
}

/// Search hit for starting a conversation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSearchResult {
    #[serde(flatten)]
    pub user: UserSummary,
    pub email: String,
    pub has_existing_chat: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Snowflake>,
}

// ============================================================================
// Message Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: Snowflake,
    pub conversation_id: Snowflake,
    pub conversation_key: String,
    pub sender_id: Snowflake,
    pub recipient_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<UserSummary>,
    pub content: String,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    pub status: MessageStatus,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub reply_to: Option<Snowflake>,
    pub reactions: Vec<Reaction>,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageResponse {
    /// Attach display fields for whichever participants are known
    pub fn with_participants(mut self, users: &[User]) -> Self {
        self.sender = users.iter().find(|u| u.id == self.sender_id).map(UserSummary::from);
        self.recipient = users
            .iter()
            .find(|u| u.id == self.recipient_id)
            .map(UserSummary::from);
        self
    }
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            conversation_key: message.conversation_key.as_str().to_string(),
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            sender: None,
            recipient: None,
            content: message.content.clone(),
            message_type: message.message_type,
            attachment: message.attachment.clone(),
            status: message.status,
            is_read: message.is_read,
            read_at: message.read_at,
            reply_to: message.reply_to,
            reactions: message.reactions.clone(),
            is_edited: message.is_edited,
            edited_at: message.edited_at,
            original_content: message.original_content.clone(),
            created_at: message.created_at,
            updated_at: message.updated_at,
        }
    }
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self::from(&message)
    }
}

/// Result of a send
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub conversation_id: Snowflake,
    /// True when this send created the conversation
    pub conversation_created: bool,
    pub message: MessageResponse,
}

/// One page of history, chronological
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub messages: Vec<MessageResponse>,
    pub total: i64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub conversation_id: Snowflake,
    pub marked_count: usize,
    pub message_ids: Vec<Snowflake>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedMessage {
    pub message_id: Snowflake,
    pub conversation_id: Snowflake,
}

/// Reaction list of a message after a change
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionUpdate {
    pub message_id: Snowflake,
    pub conversation_id: Snowflake,
    pub user_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    pub reactions: Vec<Reaction>,
}

/// Delivery or read progress of one or more messages
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub conversation_id: Snowflake,
    pub message_ids: Vec<Snowflake>,
    pub status: MessageStatus,
    pub updated_by: Snowflake,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Conversation Responses
// ============================================================================

/// Conversation list item, from the caller's point of view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Snowflake,
    pub conversation_key: String,
    pub chat_type: ChatType,
    pub participant: Option<UserSummary>,
    pub unread_count: i64,
    pub is_muted: bool,
    pub is_pinned: bool,
    pub last_message: Option<LastMessage>,
    pub last_activity: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
}

impl ConversationSummary {
    pub fn for_user(conversation: &Conversation, user_id: Snowflake, counterpart: Option<&User>) -> Self {
        Self {
            id: conversation.id,
            conversation_key: conversation.key.as_str().to_string(),
            chat_type: conversation.chat_type,
            participant: counterpart.map(UserSummary::from),
            unread_count: conversation.unread_for(user_id),
            is_muted: conversation.is_muted_for(user_id),
            is_pinned: conversation.is_pinned_for(user_id),
            last_message: conversation.last_message.clone(),
            last_activity: conversation.last_activity,
            started_at: conversation.started_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MuteState {
    pub conversation_id: Snowflake,
    pub is_muted: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinState {
    pub conversation_id: Snowflake,
    pub is_pinned: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadSummary {
    pub total_unread: i64,
    /// Conversation id to unread count, conversations with nothing unread omitted
    pub by_conversation: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    pub conversation_id: Snowflake,
    pub total_messages: i64,
    pub by_type: BTreeMap<String, i64>,
}

// ============================================================================
// Health Responses
// ============================================================================

/// Basic health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Readiness check response
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthChecks {
    pub database: String,
    /// Absent when the deployment runs without Redis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<String>,
}

fn health_label(healthy: bool) -> String {
    if healthy { "healthy" } else { "unhealthy" }.to_string()
}

impl ReadinessResponse {
    pub fn ready(database_healthy: bool, redis_healthy: Option<bool>) -> Self {
        let all_healthy = database_healthy && redis_healthy.unwrap_or(true);
        Self {
            status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
            timestamp: Utc::now(),
            checks: HealthChecks {
                database: health_label(database_healthy),
                redis: redis_healthy.map(health_label),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}
