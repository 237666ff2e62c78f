//! Chat events - server-to-client notifications produced after state changes
//!
//! The messaging layer builds these once a change is persisted and hands them to an
//! [`EventNotifier`](crate::traits::EventNotifier); the gateway serializes them as
//! dispatch frames named by [`ChatEventKind::as_str`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Every event name a client can receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEventKind {
    // Messages
    NewMessage,
    MessageSent,
    MessageStatusUpdate,
    MessageEdited,
    MessageReactionAdded,
    MessageReactionRemoved,
    MessageDeleted,

    // Conversations
    TypingIndicator,
    ChatMuteToggled,
    ChatPinToggled,
    ConversationJoined,
    ConversationLeft,

    // Presence
    UserStatusChange,

    // Call signaling (pass-through)
    IncomingCall,
    CallAccepted,
    CallRejected,
    CallEnded,

    Error,
}

impl ChatEventKind {
    pub const ALL: [ChatEventKind; 18] = [
        Self::NewMessage,
        Self::MessageSent,
        Self::MessageStatusUpdate,
        Self::MessageEdited,
        Self::MessageReactionAdded,
        Self::MessageReactionRemoved,
        Self::MessageDeleted,
        Self::TypingIndicator,
        Self::ChatMuteToggled,
        Self::ChatPinToggled,
        Self::ConversationJoined,
        Self::ConversationLeft,
        Self::UserStatusChange,
        Self::IncomingCall,
        Self::CallAccepted,
        Self::CallRejected,
        Self::CallEnded,
        Self::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
            Self::MessageSent => "message_sent",
            Self::MessageStatusUpdate => "message_status_update",
            Self::MessageEdited => "message_edited",
            Self::MessageReactionAdded => "message_reaction_added",
            Self::MessageReactionRemoved => "message_reaction_removed",
            Self::MessageDeleted => "message_deleted",
            Self::TypingIndicator => "typing_indicator",
            Self::ChatMuteToggled => "chat_mute_toggled",
            Self::ChatPinToggled => "chat_pin_toggled",
            Self::ConversationJoined => "conversation_joined",
            Self::ConversationLeft => "conversation_left",
            Self::UserStatusChange => "user_status_change",
            Self::IncomingCall => "incoming_call",
            Self::CallAccepted => "call_accepted",
            Self::CallRejected => "call_rejected",
            Self::CallEnded => "call_ended",
            Self::Error => "error",
        }
    }

    /// Typing indicators only go to connections that joined the conversation
    pub fn is_room_scoped(&self) -> bool {
        matches!(self, Self::TypingIndicator)
    }
}

impl FromStr for ChatEventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

impl fmt::Display for ChatEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

/// An event ready for fan-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub kind: ChatEventKind,
    pub payload: Value,
}

impl ChatEvent {
    pub fn new(kind: ChatEventKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// The conversation this event belongs to, if its payload names one
    pub fn conversation_id(&self) -> Option<&str> {
        self.payload.get("conversationId").and_then(Value::as_str)
    }
}
