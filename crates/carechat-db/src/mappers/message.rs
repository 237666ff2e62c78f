//! Message and Reaction entity <-> model mappers

use carechat_core::{ConversationKey, DomainError, Message, Reaction, Snowflake};

use crate::models::{MessageModel, ReactionModel};

fn corrupt(e: DomainError) -> DomainError {
    DomainError::Storage(e.to_string())
}

/// Reactions are loaded separately and start empty
impl TryFrom<MessageModel> for Message {
    type Error = DomainError;

    fn try_from(model: MessageModel) -> Result<Self, Self::Error> {
        Ok(Message {
            id: Snowflake::new(model.id),
            conversation_id: Snowflake::new(model.conversation_id),
            conversation_key: ConversationKey::parse(&model.conversation_key).map_err(corrupt)?,
            sender_id: Snowflake::new(model.sender_id),
            recipient_id: Snowflake::new(model.recipient_id),
            content: model.content,
            message_type: model.message_type.parse().map_err(corrupt)?,
            attachment: model.attachment.map(|json| json.0),
            status: model.status.parse().map_err(corrupt)?,
            is_read: model.is_read,
            read_at: model.read_at,
            reply_to: model.reply_to.map(Snowflake::new),
            reactions: Vec::new(),
            is_edited: model.is_edited,
            edited_at: model.edited_at,
            original_content: model.original_content,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl From<ReactionModel> for Reaction {
    fn from(model: ReactionModel) -> Self {
        Reaction {
            message_id: Snowflake::new(model.message_id),
            user_id: Snowflake::new(model.user_id),
            emoji: model.emoji,
            created_at: model.created_at,
        }
    }
}
