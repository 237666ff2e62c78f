//! Client event router
//!
//! Turns a decoded [`ClientEvent`] into service calls. The returned frame, if
//! any, goes back to the originating connection only; everything other
//! participants see travels through the context's `EventNotifier`.

use carechat_core::{ChatEvent, ChatEventKind, MessageStatus, PresenceStatus};
use carechat_service::{
    ConversationService, MessagingService, PresenceService, ServiceContext, ServiceError,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::instrument;

use super::{HandlerError, HandlerResult};
use crate::connection::{ConnectionManager, Session};
use crate::events::{CallSignal, ClientEvent, ReadTarget};
use crate::protocol::GatewayMessage;

pub struct EventRouter<'a> {
    ctx: &'a ServiceContext,
    connections: &'a ConnectionManager,
}

impl<'a> EventRouter<'a> {
    pub fn new(ctx: &'a ServiceContext, connections: &'a ConnectionManager) -> Self {
        Self { ctx, connections }
    }

    #[instrument(skip(self, event), fields(event = event.name()))]
    pub async fn route(
        &self,
        session: &Session,
        event: ClientEvent,
    ) -> HandlerResult<Option<GatewayMessage>> {
        let user_id = session.user_id;
        let conversations = ConversationService::new(self.ctx);
        let messaging = MessagingService::new(self.ctx);

        match event {
            ClientEvent::JoinConversation(target) => {
                conversations
                    .require_participant(target.conversation_id, user_id)
                    .await?;
                self.connections
                    .join_room(&session.session_id, target.conversation_id)
                    .await;
                reply(
                    ChatEventKind::ConversationJoined,
                    &json!({ "conversationId": target.conversation_id }),
                )
            }
            ClientEvent::LeaveConversation(target) => {
                self.connections
                    .leave_room(&session.session_id, target.conversation_id)
                    .await;
                reply(
                    ChatEventKind::ConversationLeft,
                    &json!({ "conversationId": target.conversation_id }),
                )
            }
            ClientEvent::TypingStart(target) => {
                conversations
                    .typing(target.conversation_id, user_id, true)
                    .await?;
                Ok(None)
            }
            ClientEvent::TypingStop(target) => {
                conversations
                    .typing(target.conversation_id, user_id, false)
                    .await?;
                Ok(None)
            }
            ClientEvent::MessageRead(target) => {
                self.read(&messaging, session, target).await?;
                Ok(None)
            }
            ClientEvent::MessageDelivered(target) => {
                messaging
                    .update_status(target.message_id, user_id, MessageStatus::Delivered)
                    .await?;
                Ok(None)
            }
            ClientEvent::SendMessage(request) => {
                let sent = messaging.send_message(user_id, request).await?;
                reply(ChatEventKind::MessageSent, &sent)
            }
            ClientEvent::EditMessage(edit) => {
                messaging
                    .edit_message(edit.message_id, user_id, edit.content)
                    .await?;
                Ok(None)
            }
            ClientEvent::AddReaction(reaction) => {
                messaging
                    .add_reaction(reaction.message_id, user_id, &reaction.emoji)
                    .await?;
                Ok(None)
            }
            ClientEvent::RemoveReaction(target) => {
                messaging.remove_reaction(target.message_id, user_id).await?;
                Ok(None)
            }
            ClientEvent::DeleteMessage(target) => {
                messaging.delete_message(target.message_id, user_id).await?;
                Ok(None)
            }
            ClientEvent::ToggleMute(target) => {
                conversations
                    .toggle_mute(target.conversation_id, user_id)
                    .await?;
                Ok(None)
            }
            ClientEvent::TogglePin(target) => {
                conversations
                    .toggle_pin(target.conversation_id, user_id)
                    .await?;
                Ok(None)
            }
            ClientEvent::UserAway => {
                PresenceService::new(self.ctx)
                    .set_status(user_id, PresenceStatus::Away)
                    .await?;
                Ok(None)
            }
            ClientEvent::UserBack => {
                PresenceService::new(self.ctx)
                    .set_status(user_id, PresenceStatus::Online)
                    .await?;
                Ok(None)
            }
            ClientEvent::Call(signal) => {
                self.relay_call(&conversations, session, signal).await?;
                Ok(None)
            }
        }
    }

    async fn read(
        &self,
        messaging: &MessagingService<'_>,
        session: &Session,
        target: ReadTarget,
    ) -> HandlerResult<()> {
        match target {
            ReadTarget {
                conversation_id: Some(conversation_id),
                ..
            } => {
                messaging
                    .mark_conversation_read(conversation_id, session.user_id)
                    .await?;
            }
            ReadTarget {
                message_id: Some(message_id),
                ..
            } => {
                messaging
                    .update_status(message_id, session.user_id, MessageStatus::Read)
                    .await?;
            }
            _ => {
                return Err(HandlerError::InvalidPayload {
                    event: "message_read".to_string(),
                    reason: "conversationId or messageId is required".to_string(),
                })
            }
        }
        Ok(())
    }

    /// Forward a call signal to the counterpart, tagged with the caller
    async fn relay_call(
        &self,
        conversations: &ConversationService<'_>,
        session: &Session,
        signal: CallSignal,
    ) -> HandlerResult<()> {
        let other = conversations
            .counterpart(signal.conversation_id, session.user_id)
            .await?;

        let mut payload = match signal.payload {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        payload.insert("fromUserId".to_string(), json!(session.user_id));

        let kind = signal.kind.outbound();
        tracing::debug!(
            conversation_id = %signal.conversation_id,
            event = %kind,
            "Relaying call signal"
        );
        self.ctx
            .notifier()
            .notify(&[other], ChatEvent::new(kind, Value::Object(payload)))
            .await;
        Ok(())
    }
}

fn reply<T: Serialize + ?Sized>(kind: ChatEventKind, data: &T) -> HandlerResult<Option<GatewayMessage>> {
    let data = serde_json::to_value(data)
        .map_err(|e| ServiceError::internal(format!("failed to encode {kind}: {e}")))?;
    Ok(Some(GatewayMessage::dispatch(kind.as_str(), data)))
}
