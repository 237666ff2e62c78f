//! Reaction entity - a user's emoji on a message (one per user per message)

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::value_objects::Snowflake;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    #[serde(skip)]
    pub message_id: Snowflake,
    pub user_id: Snowflake,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

impl Reaction {
    pub fn new(message_id: Snowflake, user_id: Snowflake, emoji: String, now: DateTime<Utc>) -> Self {
        Self {
            message_id,
            user_id,
            emoji,
            created_at: now,
        }
    }
}
