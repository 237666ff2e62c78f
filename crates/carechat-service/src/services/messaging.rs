//! Messaging service
//!
//! Sending, history, read state, edits, reactions and deletes. Every
//! operation persists first and fans out afterwards.

use std::collections::HashMap;

use carechat_core::traits::MessageQuery;
use carechat_core::{
    ChatEventKind, Conversation, ConversationKey, LastMessage, Message, MessageStatus, Reaction,
    Snowflake, MAX_CONTENT_LENGTH,
};
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::dto::{
    DeletedMessage, HistoryPage, HistoryQuery, MessageResponse, ReactionUpdate, ReadReceipt,
    SendMessageRequest, SentMessage, StatusUpdate,
};

use super::context::ServiceContext;
use super::conversation::ConversationService;
use super::error::{ServiceError, ServiceResult};
use super::events;

const MAX_EMOJI_LENGTH: usize = 32;

/// Messaging service
pub struct MessagingService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> MessagingService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Send a direct message, creating the conversation on first contact
    #[instrument(skip(self, request), fields(recipient_id = %request.recipient_id))]
    pub async fn send_message(
        &self,
        sender_id: Snowflake,
        request: SendMessageRequest,
    ) -> ServiceResult<SentMessage> {
        request.validate()?;
        let recipient_id = request.recipient_id;
        let key = ConversationKey::for_pair(sender_id, recipient_id)?;

        let users = self
            .ctx
            .user_directory()
            .find_many(&[sender_id, recipient_id])
            .await?;
        if !users.iter().any(|u| u.id == recipient_id) {
            return Err(ServiceError::not_found("User", recipient_id));
        }

        // The replied-to message must belong to this pair
        if let Some(reply_id) = request.reply_to {
            self.ctx
                .message_repo()
                .find_by_id(reply_id)
                .await?
                .filter(|parent| parent.conversation_key == key)
                .ok_or_else(|| ServiceError::not_found("Message", reply_id))?;
        }

        let now = self.ctx.now();
        let (conversation, created) = self
            .ctx
            .conversation_repo()
            .find_or_create(sender_id, recipient_id, self.ctx.generate_id(), now)
            .await?;

        let message = Message::new(
            self.ctx.generate_id(),
            conversation.id,
            sender_id,
            recipient_id,
            request.content,
            now,
        )
        .with_type(request.message_type)
        .with_reply_to(request.reply_to)
        .with_attachment(request.attachment);

        self.ctx.message_repo().create(&message).await?;

        // The message is durable from here on; conversation bookkeeping is best effort
        let conversations = self.ctx.conversation_repo();
        if let Err(e) = conversations
            .update_last_message(conversation.id, &LastMessage::from(&message), now)
            .await
        {
            warn!(conversation_id = %conversation.id, error = %e, "Failed to update last message");
        }
        if let Err(e) = conversations
            .increment_unread(conversation.id, recipient_id)
            .await
        {
            warn!(conversation_id = %conversation.id, error = %e, "Failed to increment unread count");
        }

        info!(
            message_id = %message.id,
            conversation_id = %conversation.id,
            created = created,
            "Message sent"
        );

        let response = MessageResponse::from(&message).with_participants(&users);
        events::notify(self.ctx, &[recipient_id], ChatEventKind::NewMessage, &response).await;

        Ok(SentMessage {
            conversation_id: conversation.id,
            conversation_created: created,
            message: response,
        })
    }

    /// Mark everything addressed to `user_id` in the conversation as read
    #[instrument(skip(self))]
    pub async fn mark_conversation_read(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> ServiceResult<ReadReceipt> {
        let conversation = ConversationService::new(self.ctx)
            .require_participant(conversation_id, user_id)
            .await?;
        self.mark_read(&conversation, user_id).await
    }

    async fn mark_read(
        &self,
        conversation: &Conversation,
        user_id: Snowflake,
    ) -> ServiceResult<ReadReceipt> {
        let now = self.ctx.now();
        let message_ids = self
            .ctx
            .message_repo()
            .mark_read_for_recipient(&conversation.key, user_id, now)
            .await?;
        self.ctx
            .conversation_repo()
            .reset_unread(conversation.id, user_id)
            .await?;

        if !message_ids.is_empty() {
            debug!(conversation_id = %conversation.id, count = message_ids.len(), "Messages marked read");
            if let Some(other) = conversation.counterpart(user_id) {
                let update = StatusUpdate {
                    conversation_id: conversation.id,
                    message_ids: message_ids.clone(),
                    status: MessageStatus::Read,
                    updated_by: user_id,
                    timestamp: now,
                };
                events::notify(self.ctx, &[other], ChatEventKind::MessageStatusUpdate, &update)
                    .await;
            }
        }

        Ok(ReadReceipt {
            conversation_id: conversation.id,
            marked_count: message_ids.len(),
            message_ids,
        })
    }

    /// One page of history. Reading history marks the conversation read first,
    /// so the page already reflects the new read state.
    #[instrument(skip(self))]
    pub async fn get_history(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
        query: HistoryQuery,
    ) -> ServiceResult<HistoryPage> {
        let conversation = ConversationService::new(self.ctx)
            .require_participant(conversation_id, user_id)
            .await?;
        self.mark_read(&conversation, user_id).await?;

        let settings = self.ctx.chat_config();
        let limit = query
            .limit
            .unwrap_or(settings.history_default_limit)
            .clamp(1, settings.history_max_limit);

        let repo = self.ctx.message_repo();
        let mut messages = repo
            .find_history(
                &conversation.key,
                MessageQuery {
                    before: query.before,
                    after: query.after,
                    limit: limit + 1,
                },
            )
            .await?;

        // One extra row tells us whether another page exists. Reading forward
        // it sits at the end, otherwise it is the oldest row at the front.
        let has_more = messages.len() as i64 > limit;
        if has_more {
            if query.after.is_some() {
                messages.pop();
            } else {
                messages.remove(0);
            }
        }

        self.attach_reactions(&mut messages).await?;
        let total = repo.count_in_conversation(&conversation.key).await?;
        let users = self
            .ctx
            .user_directory()
            .find_many(&conversation.participants)
            .await?;

        Ok(HistoryPage {
            messages: messages
                .iter()
                .map(|m| MessageResponse::from(m).with_participants(&users))
                .collect(),
            total,
            has_more,
        })
    }

    /// Advance delivery state; only the recipient can acknowledge
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        message_id: Snowflake,
        user_id: Snowflake,
        status: MessageStatus,
    ) -> ServiceResult<MessageResponse> {
        let mut message = self.load_message(message_id).await?;
        if message.recipient_id != user_id {
            return Err(ServiceError::forbidden(
                "only the recipient can update message status",
            ));
        }
        if !matches!(status, MessageStatus::Delivered | MessageStatus::Read) {
            return Err(ServiceError::validation(format!(
                "status must be delivered or read, got {status}"
            )));
        }

        let now = self.ctx.now();
        let previous = message.status;
        if message.advance_status(status, now)? {
            let stored = self
                .ctx
                .message_repo()
                .update_status(&message, previous)
                .await?;
            if stored {
                debug!(message_id = %message.id, status = %status, "Message status updated");

                let update = StatusUpdate {
                    conversation_id: message.conversation_id,
                    message_ids: vec![message.id],
                    status,
                    updated_by: user_id,
                    timestamp: now,
                };
                events::notify(
                    self.ctx,
                    &[message.sender_id],
                    ChatEventKind::MessageStatusUpdate,
                    &update,
                )
                .await;
            } else {
                // A concurrent write (usually a mark-read) got there first
                debug!(message_id = %message.id, "Status changed concurrently");
                message = self.load_message(message_id).await?;
            }
        }

        message.reactions = self.ctx.reaction_repo().list_for_message(message.id).await?;
        Ok(MessageResponse::from(message))
    }

    /// Edit content within the configured window
    #[instrument(skip(self, content))]
    pub async fn edit_message(
        &self,
        message_id: Snowflake,
        user_id: Snowflake,
        content: String,
    ) -> ServiceResult<MessageResponse> {
        let mut message = self.load_message(message_id).await?;
        message.ensure_sender(user_id, "edit")?;

        let now = self.ctx.now();
        let window = self.ctx.edit_window();
        message.ensure_editable(now, window)?;
        validate_content(&content)?;

        message.edit(content, now, window)?;
        self.ctx.message_repo().update_content(&message).await?;
        info!(message_id = %message.id, "Message edited");

        message.reactions = self.ctx.reaction_repo().list_for_message(message.id).await?;
        let response = MessageResponse::from(&message);
        events::notify(
            self.ctx,
            &[message.sender_id, message.recipient_id],
            ChatEventKind::MessageEdited,
            &response,
        )
        .await;

        Ok(response)
    }

    /// Set the caller's reaction, replacing any earlier one
    #[instrument(skip(self))]
    pub async fn add_reaction(
        &self,
        message_id: Snowflake,
        user_id: Snowflake,
        emoji: &str,
    ) -> ServiceResult<ReactionUpdate> {
        let message = self.load_message(message_id).await?;
        message.ensure_participant(user_id)?;

        let emoji = emoji.trim();
        let length = emoji.chars().count();
        if length == 0 || length > MAX_EMOJI_LENGTH {
            return Err(ServiceError::validation(format!(
                "emoji must be 1-{MAX_EMOJI_LENGTH} characters"
            )));
        }

        let reaction = Reaction::new(message.id, user_id, emoji.to_string(), self.ctx.now());
        self.ctx.reaction_repo().upsert(&reaction).await?;

        let update = ReactionUpdate {
            message_id: message.id,
            conversation_id: message.conversation_id,
            user_id,
            emoji: Some(reaction.emoji),
            reactions: self.ctx.reaction_repo().list_for_message(message.id).await?,
        };
        events::notify(
            self.ctx,
            &[message.sender_id, message.recipient_id],
            ChatEventKind::MessageReactionAdded,
            &update,
        )
        .await;

        Ok(update)
    }

    /// Drop the caller's reaction; a no-op if there was none
    #[instrument(skip(self))]
    pub async fn remove_reaction(
        &self,
        message_id: Snowflake,
        user_id: Snowflake,
    ) -> ServiceResult<ReactionUpdate> {
        let message = self.load_message(message_id).await?;
        message.ensure_participant(user_id)?;

        let removed = self.ctx.reaction_repo().remove(message.id, user_id).await?;
        let update = ReactionUpdate {
            message_id: message.id,
            conversation_id: message.conversation_id,
            user_id,
            emoji: None,
            reactions: self.ctx.reaction_repo().list_for_message(message.id).await?,
        };

        if removed {
            events::notify(
                self.ctx,
                &[message.sender_id, message.recipient_id],
                ChatEventKind::MessageReactionRemoved,
                &update,
            )
            .await;
        }

        Ok(update)
    }

    /// Permanently delete a message; sender only
    #[instrument(skip(self))]
    pub async fn delete_message(
        &self,
        message_id: Snowflake,
        user_id: Snowflake,
    ) -> ServiceResult<DeletedMessage> {
        let message = self.load_message(message_id).await?;
        message.ensure_sender(user_id, "delete")?;

        if !self.ctx.message_repo().delete(message.id).await? {
            // Lost a race with another delete
            return Err(ServiceError::not_found("Message", message.id));
        }
        info!(message_id = %message.id, "Message deleted");

        let deleted = DeletedMessage {
            message_id: message.id,
            conversation_id: message.conversation_id,
        };
        events::notify(
            self.ctx,
            &[message.sender_id, message.recipient_id],
            ChatEventKind::MessageDeleted,
            &deleted,
        )
        .await;

        Ok(deleted)
    }

    async fn load_message(&self, message_id: Snowflake) -> ServiceResult<Message> {
        self.ctx
            .message_repo()
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Message", message_id))
    }

    async fn attach_reactions(&self, messages: &mut [Message]) -> ServiceResult<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let ids: Vec<Snowflake> = messages.iter().map(|m| m.id).collect();
        let mut by_message: HashMap<Snowflake, Vec<Reaction>> = HashMap::new();
        for reaction in self.ctx.reaction_repo().list_for_messages(&ids).await? {
            by_message.entry(reaction.message_id).or_default().push(reaction);
        }
        for message in messages.iter_mut() {
            message.reactions = by_message.remove(&message.id).unwrap_or_default();
        }
        Ok(())
    }
}

fn validate_content(content: &str) -> ServiceResult<()> {
    if content.trim().is_empty() {
        return Err(ServiceError::validation("content must not be empty"));
    }
    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(ServiceError::validation(format!(
            "content must be at most {MAX_CONTENT_LENGTH} characters"
        )));
    }
    Ok(())
}
