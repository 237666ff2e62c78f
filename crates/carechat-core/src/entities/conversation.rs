//! Conversation entity - one record per unordered pair of participants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::entities::{Message, MessageStatus, MessageType};
use crate::error::DomainError;
use crate::value_objects::{ConversationKey, Snowflake};

/// Only `Direct` is exercised; `Group` is kept so stored rows round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    #[default]
    Direct,
    Group,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }
}

impl FromStr for ChatType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "group" => Ok(Self::Group),
            other => Err(DomainError::validation(format!("unknown chat type: {other}"))),
        }
    }
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of the latest message.
///
/// Not refreshed when that message is later edited, reacted to or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub message_id: Snowflake,
    pub content: String,
    pub sender_id: Snowflake,
    pub timestamp: DateTime<Utc>,
    pub message_type: MessageType,
    pub status: MessageStatus,
}

impl From<&Message> for LastMessage {
    fn from(message: &Message) -> Self {
        Self {
            message_id: message.id,
            content: message.content.clone(),
            sender_id: message.sender_id,
            timestamp: message.created_at,
            message_type: message.message_type,
            status: message.status,
        }
    }
}

/// Conversation entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: Snowflake,
    pub key: ConversationKey,
    pub participants: Vec<Snowflake>,
    pub chat_type: ChatType,
    pub last_message: Option<LastMessage>,
    pub unread_counts: HashMap<Snowflake, i64>,
    pub muted: HashMap<Snowflake, bool>,
    pub pinned: HashMap<Snowflake, bool>,
    pub is_active: bool,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Conversation {
    /// New, empty direct conversation for the pair encoded in `key`
    pub fn new_direct(id: Snowflake, key: ConversationKey, now: DateTime<Utc>) -> Self {
        let (a, b) = key.participants();
        Self {
            id,
            key,
            participants: vec![a, b],
            chat_type: ChatType::Direct,
            last_message: None,
            unread_counts: HashMap::new(),
            muted: HashMap::new(),
            pinned: HashMap::new(),
            is_active: true,
            started_at: now,
            last_activity: now,
        }
    }

    #[inline]
    pub fn is_participant(&self, user_id: Snowflake) -> bool {
        self.participants.contains(&user_id)
    }

    pub fn ensure_participant(&self, user_id: Snowflake) -> Result<(), DomainError> {
        if self.is_participant(user_id) {
            Ok(())
        } else {
            Err(DomainError::forbidden("not a participant of this conversation"))
        }
    }

    /// The other side of a direct conversation
    pub fn counterpart(&self, user_id: Snowflake) -> Option<Snowflake> {
        if !self.is_participant(user_id) {
            return None;
        }
        self.participants.iter().copied().find(|p| *p != user_id)
    }

    pub fn unread_for(&self, user_id: Snowflake) -> i64 {
        self.unread_counts.get(&user_id).copied().unwrap_or(0)
    }

    pub fn is_muted_for(&self, user_id: Snowflake) -> bool {
        self.muted.get(&user_id).copied().unwrap_or(false)
    }

    pub fn is_pinned_for(&self, user_id: Snowflake) -> bool {
        self.pinned.get(&user_id).copied().unwrap_or(false)
    }

    pub fn record_message(&mut self, snapshot: LastMessage, now: DateTime<Utc>) {
        self.last_message = Some(snapshot);
        self.last_activity = now;
        self.is_active = true;
    }

    /// Returns the new counter value
    pub fn increment_unread(&mut self, user_id: Snowflake) -> i64 {
        let count = self.unread_counts.entry(user_id).or_insert(0);
        *count += 1;
        *count
    }

    pub fn reset_unread(&mut self, user_id: Snowflake) {
        self.unread_counts.insert(user_id, 0);
    }

    /// Returns the new flag value
    pub fn toggle_mute(&mut self, user_id: Snowflake) -> bool {
        Self::flip(&mut self.muted, user_id)
    }

    /// Returns the new flag value
    pub fn toggle_pin(&mut self, user_id: Snowflake) -> bool {
        Self::flip(&mut self.pinned, user_id)
    }

    fn flip(flags: &mut HashMap<Snowflake, bool>, user_id: Snowflake) -> bool {
        let flag = flags.entry(user_id).or_insert(false);
        *flag = !*flag;
        *flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Conversation {
        let key = ConversationKey::resolve(Snowflake::new(10), Snowflake::new(20));
        Conversation::new_direct(Snowflake::new(1), key, Utc::now())
    }

    #[test]
    fn test_new_direct_has_both_participants() {
        let conv = conversation();
        assert!(conv.is_participant(Snowflake::new(10)));
        assert!(conv.is_participant(Snowflake::new(20)));
        assert!(conv.last_message.is_none());
        assert_eq!(conv.unread_for(Snowflake::new(10)), 0);
    }

    #[test]
    fn test_counterpart() {
        let conv = conversation();
        assert_eq!(conv.counterpart(Snowflake::new(10)), Some(Snowflake::new(20)));
        assert_eq!(conv.counterpart(Snowflake::new(99)), None);
    }

    #[test]
    fn test_unread_is_per_participant() {
        let mut conv = conversation();
        let (a, b) = (Snowflake::new(10), Snowflake::new(20));

        assert_eq!(conv.increment_unread(b), 1);
        assert_eq!(conv.increment_unread(b), 2);
        assert_eq!(conv.unread_for(a), 0);

        conv.reset_unread(b);
        assert_eq!(conv.unread_for(b), 0);
    }

    #[test]
    fn test_toggles_flip_independently() {
        let mut conv = conversation();
        let (a, b) = (Snowflake::new(10), Snowflake::new(20));

        assert!(conv.toggle_mute(a));
        assert!(!conv.is_muted_for(b));
        assert!(!conv.toggle_mute(a));

        assert!(conv.toggle_pin(b));
        assert!(conv.is_pinned_for(b));
        assert!(!conv.is_pinned_for(a));
    }

    #[test]
    fn test_ensure_participant() {
        let conv = conversation();
        assert!(conv.ensure_participant(Snowflake::new(10)).is_ok());
        assert!(conv
            .ensure_participant(Snowflake::new(30))
            .unwrap_err()
            .is_authorization());
    }
}
