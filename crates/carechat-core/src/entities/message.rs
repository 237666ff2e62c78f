//! Message entity - a single direct message and its delivery/edit/reaction state

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entities::Reaction;
use crate::error::DomainError;
use crate::value_objects::{ConversationKey, Snowflake};

/// Maximum message length in characters
pub const MAX_CONTENT_LENGTH: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
    Audio,
    Video,
}

impl MessageType {
    pub const ALL: [MessageType; 5] = [
        Self::Text,
        Self::Image,
        Self::File,
        Self::Audio,
        Self::Video,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl FromStr for MessageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown message type: {s}")))
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status.
///
/// `sending -> sent -> delivered -> read` on the happy path, with `failed`
/// reachable only from `sending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    #[default]
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
        }
    }

    pub fn can_advance_to(self, next: MessageStatus) -> bool {
        matches!(
            (self, next),
            (Self::Sending, Self::Sent | Self::Failed)
                | (Self::Sent, Self::Delivered | Self::Read)
                | (Self::Delivered, Self::Read)
        )
    }

    /// True when `other` is an earlier point on the happy path than `self`
    pub fn is_past(self, other: MessageStatus) -> bool {
        match (self.rank(), other.rank()) {
            (Some(current), Some(other)) => other < current,
            _ => false,
        }
    }

    fn rank(self) -> Option<u8> {
        match self {
            Self::Sending => Some(0),
            Self::Sent => Some(1),
            Self::Delivered => Some(2),
            Self::Read => Some(3),
            Self::Failed => None,
        }
    }
}

impl FromStr for MessageStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "read" => Ok(Self::Read),
            "failed" => Ok(Self::Failed),
            other => Err(DomainError::validation(format!(
                "unknown message status: {other}"
            ))),
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored file descriptor handed over by the upload service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
    pub size: i64,
    pub url: String,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Snowflake,
    pub conversation_id: Snowflake,
    pub conversation_key: ConversationKey,
    pub sender_id: Snowflake,
    pub recipient_id: Snowflake,
    pub content: String,
    pub message_type: MessageType,
    pub attachment: Option<Attachment>,
    pub status: MessageStatus,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub reply_to: Option<Snowflake>,
    pub reactions: Vec<Reaction>,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub original_content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Create a freshly sent text message. The conversation key is derived from the
    /// sender/recipient pair and stored on the message.
    pub fn new(
        id: Snowflake,
        conversation_id: Snowflake,
        sender_id: Snowflake,
        recipient_id: Snowflake,
        content: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            conversation_key: ConversationKey::resolve(sender_id, recipient_id),
            sender_id,
            recipient_id,
            content,
            message_type: MessageType::Text,
            attachment: None,
            status: MessageStatus::Sent,
            is_read: false,
            read_at: None,
            reply_to: None,
            reactions: Vec::new(),
            is_edited: false,
            edited_at: None,
            original_content: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn with_reply_to(mut self, reply_to: Option<Snowflake>) -> Self {
        self.reply_to = reply_to;
        self
    }

    pub fn with_attachment(mut self, attachment: Option<Attachment>) -> Self {
        self.attachment = attachment;
        self
    }

    #[inline]
    pub fn is_participant(&self, user_id: Snowflake) -> bool {
        self.sender_id == user_id || self.recipient_id == user_id
    }

    pub fn ensure_sender(&self, user_id: Snowflake, action: &str) -> Result<(), DomainError> {
        if self.sender_id == user_id {
            Ok(())
        } else {
            Err(DomainError::forbidden(format!("only the sender can {action} a message")))
        }
    }

    pub fn ensure_participant(&self, user_id: Snowflake) -> Result<(), DomainError> {
        if self.is_participant(user_id) {
            Ok(())
        } else {
            Err(DomainError::forbidden("not a participant of this conversation"))
        }
    }

    pub fn ensure_editable(&self, now: DateTime<Utc>, window: Duration) -> Result<(), DomainError> {
        if now - self.created_at > window {
            return Err(DomainError::EditWindowExpired {
                minutes: window.num_minutes(),
            });
        }
        Ok(())
    }

    /// Replace the content if the edit window is still open.
    ///
    /// The first edit keeps the original text; later edits leave it untouched.
    pub fn edit(
        &mut self,
        content: String,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<(), DomainError> {
        self.ensure_editable(now, window)?;
        if self.original_content.is_none() {
            self.original_content = Some(std::mem::take(&mut self.content));
        }
        self.content = content;
        self.is_edited = true;
        self.edited_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Move the delivery status forward.
    ///
    /// Returns `Ok(false)` when `next` is the current status or already behind it,
    /// which makes late delivery receipts harmless.
    pub fn advance_status(
        &mut self,
        next: MessageStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        if self.status == next || self.status.is_past(next) {
            return Ok(false);
        }
        if !self.status.can_advance_to(next) {
            return Err(DomainError::validation(format!(
                "cannot move message from {} to {}",
                self.status, next
            )));
        }
        self.status = next;
        if next == MessageStatus::Read {
            self.is_read = true;
            self.read_at = Some(now);
        }
        self.updated_at = now;
        Ok(true)
    }

    /// Set `user_id`'s reaction, replacing any earlier one from the same user
    pub fn set_reaction(&mut self, user_id: Snowflake, emoji: String, now: DateTime<Utc>) {
        self.reactions.retain(|r| r.user_id != user_id);
        self.reactions
            .push(Reaction::new(self.id, user_id, emoji, now));
    }

    pub fn remove_reaction(&mut self, user_id: Snowflake) -> bool {
        let before = self.reactions.len();
        self.reactions.retain(|r| r.user_id != user_id);
        before != self.reactions.len()
    }
}
