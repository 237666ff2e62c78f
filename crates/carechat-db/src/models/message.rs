//! Message database model

use carechat_core::Attachment;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;

/// Database model for messages table
#[derive(Debug, Clone, FromRow)]
pub struct MessageModel {
    pub id: i64,
    pub conversation_id: i64,
    pub conversation_key: String,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub content: String,
    pub message_type: String,
    pub attachment: Option<Json<Attachment>>,
    pub status: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub reply_to: Option<i64>,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub original_content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the per-type statistics query
#[derive(Debug, Clone, FromRow)]
pub struct TypeCountModel {
    pub message_type: String,
    pub count: i64,
}
