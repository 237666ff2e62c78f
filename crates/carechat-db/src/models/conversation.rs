//! Conversation database model

use carechat_core::LastMessage;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;

/// Database model for conversations table.
///
/// The per-participant maps are JSONB objects keyed by the participant id as text,
/// so single counters and flags can be updated atomically with `jsonb_set`.
#[derive(Debug, Clone, FromRow)]
pub struct ConversationModel {
    pub id: i64,
    pub conversation_key: String,
    pub participants: Vec<i64>,
    pub chat_type: String,
    pub last_message: Option<Json<LastMessage>>,
    pub unread_counts: Json<HashMap<String, i64>>,
    pub muted: Json<HashMap<String, bool>>,
    pub pinned: Json<HashMap<String, bool>>,
    pub is_active: bool,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}
