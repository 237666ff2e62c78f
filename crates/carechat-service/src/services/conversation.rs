//! Conversation service
//!
//! Per-user views of conversations and the per-participant flags.

use std::collections::BTreeMap;

use carechat_core::{ChatEventKind, Conversation, Snowflake};
use serde_json::json;
use tracing::{debug, instrument};

use crate::dto::{ConversationStats, ConversationSummary, MuteState, PinState, UnreadSummary, UserPresence, UserSummary};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::events;

/// Conversation service
pub struct ConversationService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ConversationService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Load a conversation the user takes part in
    ///
    /// # Errors
    /// `NotFound` if it does not exist, `Forbidden` for non-participants
    pub async fn require_participant(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> ServiceResult<Conversation> {
        let conversation = self
            .ctx
            .conversation_repo()
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Conversation", conversation_id))?;
        conversation.ensure_participant(user_id)?;
        Ok(conversation)
    }

    /// The other participant of a direct conversation
    pub async fn counterpart(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> ServiceResult<Snowflake> {
        let conversation = self.require_participant(conversation_id, user_id).await?;
        conversation
            .counterpart(user_id)
            .ok_or_else(|| ServiceError::internal("direct conversation without a counterpart"))
    }

    /// Active conversations, most recent activity first
    #[instrument(skip(self))]
    pub async fn list_conversations(
        &self,
        user_id: Snowflake,
    ) -> ServiceResult<Vec<ConversationSummary>> {
        let conversations = self.ctx.conversation_repo().find_by_user(user_id).await?;

        let mut counterpart_ids: Vec<Snowflake> = conversations
            .iter()
            .filter_map(|c| c.counterpart(user_id))
            .collect();
        counterpart_ids.sort_unstable();
        counterpart_ids.dedup();
        let users = self.ctx.user_directory().find_many(&counterpart_ids).await?;

        Ok(conversations
            .iter()
            .map(|conversation| {
                let other = conversation
                    .counterpart(user_id)
                    .and_then(|id| users.iter().find(|u| u.id == id));
                ConversationSummary::for_user(conversation, user_id, other)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn toggle_mute(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> ServiceResult<MuteState> {
        self.require_participant(conversation_id, user_id).await?;
        let is_muted = self
            .ctx
            .conversation_repo()
            .toggle_mute(conversation_id, user_id)
            .await?;
        debug!(conversation_id = %conversation_id, is_muted, "Mute toggled");

        let state = MuteState {
            conversation_id,
            is_muted,
        };
        events::notify(self.ctx, &[user_id], ChatEventKind::ChatMuteToggled, &state).await;
        Ok(state)
    }

    #[instrument(skip(self))]
    pub async fn toggle_pin(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> ServiceResult<PinState> {
        self.require_participant(conversation_id, user_id).await?;
        let is_pinned = self
            .ctx
            .conversation_repo()
            .toggle_pin(conversation_id, user_id)
            .await?;
        debug!(conversation_id = %conversation_id, is_pinned, "Pin toggled");

        let state = PinState {
            conversation_id,
            is_pinned,
        };
        events::notify(self.ctx, &[user_id], ChatEventKind::ChatPinToggled, &state).await;
        Ok(state)
    }

    #[instrument(skip(self))]
    pub async fn unread_summary(&self, user_id: Snowflake) -> ServiceResult<UnreadSummary> {
        let conversations = self.ctx.conversation_repo().find_by_user(user_id).await?;

        let by_conversation: BTreeMap<String, i64> = conversations
            .iter()
            .map(|c| (c.id.to_string(), c.unread_for(user_id)))
            .filter(|(_, count)| *count > 0)
            .collect();

        Ok(UnreadSummary {
            total_unread: by_conversation.values().sum(),
            by_conversation,
        })
    }

    /// Display fields and presence of everyone in the conversation
    #[instrument(skip(self))]
    pub async fn participants(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> ServiceResult<Vec<UserPresence>> {
        let conversation = self.require_participant(conversation_id, user_id).await?;
        let users = self
            .ctx
            .user_directory()
            .find_many(&conversation.participants)
            .await?;
        let statuses = self.ctx.presence().statuses(&conversation.participants).await?;

        Ok(users
            .iter()
            .map(|user| UserPresence {
                user: UserSummary::from(user),
                status: statuses.get(&user.id).copied().unwrap_or_default(),
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn conversation_stats(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> ServiceResult<ConversationStats> {
        let conversation = self.require_participant(conversation_id, user_id).await?;
        let counts = self
            .ctx
            .message_repo()
            .count_by_type(&conversation.key)
            .await?;

        let by_type: BTreeMap<String, i64> = counts
            .into_iter()
            .map(|(message_type, count)| (message_type.to_string(), count))
            .collect();

        Ok(ConversationStats {
            conversation_id,
            total_messages: by_type.values().sum(),
            by_type,
        })
    }

    /// Tell the counterpart that the user started or stopped typing
    #[instrument(skip(self))]
    pub async fn typing(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
        is_typing: bool,
    ) -> ServiceResult<Snowflake> {
        let other = self.counterpart(conversation_id, user_id).await?;
        let payload = json!({
            "conversationId": conversation_id,
            "userId": user_id,
            "isTyping": is_typing,
        });
        events::notify(self.ctx, &[other], ChatEventKind::TypingIndicator, &payload).await;
        Ok(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::SendMessageRequest;
    use crate::services::MessagingService;
    use crate::testing::{Target, TestContext};
    use carechat_core::{ConversationRepository, MessageType, PresenceRegistry, PresenceStatus, User, UserRole};
    use chrono::Duration;

    async fn send(env: &TestContext, from: &User, to: &User, kind: MessageType) -> Snowflake {
        MessagingService::new(&env.ctx)
            .send_message(
                from.id,
                SendMessageRequest {
                    recipient_id: to.id,
                    content: "hello".into(),
                    message_type: kind,
                    reply_to: None,
                    attachment: None,
                },
            )
            .await
            .unwrap()
            .conversation_id
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first_with_counterpart() {
        let env = TestContext::new();
        let mom = env.add_user("Ada", UserRole::Mom);
        let doctor = env.add_user("Dr. Bea", UserRole::Doctor);
        let midwife = env.add_user("Cleo", UserRole::Midwife);

        let with_doctor = send(&env, &mom, &doctor, MessageType::Text).await;
        env.clock.advance(Duration::seconds(5));
        let with_midwife = send(&env, &midwife, &mom, MessageType::Text).await;

        let list = ConversationService::new(&env.ctx)
            .list_conversations(mom.id)
            .await
            .unwrap();
        let order: Vec<_> = list.iter().map(|c| c.id).collect();
        assert_eq!(order, [with_midwife, with_doctor]);
        assert_eq!(list[0].participant.as_ref().unwrap().display_name, "Cleo");
        assert_eq!(list[0].unread_count, 1);
        assert_eq!(list[1].unread_count, 0);
        assert!(list[0].last_message.is_some());
    }

    #[tokio::test]
    async fn test_inactive_conversations_are_hidden_until_next_message() {
        let env = TestContext::new();
        let mom = env.add_user("Ada", UserRole::Mom);
        let doctor = env.add_user("Dr. Bea", UserRole::Doctor);
        let id = send(&env, &mom, &doctor, MessageType::Text).await;
        let service = ConversationService::new(&env.ctx);

        env.store.set_active(id, false).await.unwrap();
        assert!(service.list_conversations(mom.id).await.unwrap().is_empty());

        send(&env, &doctor, &mom, MessageType::Text).await;
        assert_eq!(service.list_conversations(mom.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_toggles_are_per_user_and_notify_actor() {
        let env = TestContext::new();
        let mom = env.add_user("Ada", UserRole::Mom);
        let doctor = env.add_user("Dr. Bea", UserRole::Doctor);
        let id = send(&env, &mom, &doctor, MessageType::Text).await;
        let service = ConversationService::new(&env.ctx);

        assert!(service.toggle_mute(id, mom.id).await.unwrap().is_muted);
        assert!(service.toggle_pin(id, doctor.id).await.unwrap().is_pinned);
        assert!(!service.toggle_mute(id, mom.id).await.unwrap().is_muted);

        let list = service.list_conversations(doctor.id).await.unwrap();
        assert!(list[0].is_pinned);
        assert!(!list[0].is_muted);

        let mutes = env.notifier.of_kind(ChatEventKind::ChatMuteToggled).await;
        assert_eq!(mutes.len(), 2);
        assert_eq!(mutes[0].target, Target::Users(vec![mom.id]));
        let pins = env.notifier.of_kind(ChatEventKind::ChatPinToggled).await;
        assert_eq!(pins[0].target, Target::Users(vec![doctor.id]));

        let outsider = env.add_user("Eve", UserRole::Mom);
        let err = service.toggle_pin(id, outsider.id).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_unread_summary() {
        let env = TestContext::new();
        let mom = env.add_user("Ada", UserRole::Mom);
        let doctor = env.add_user("Dr. Bea", UserRole::Doctor);
        let midwife = env.add_user("Cleo", UserRole::Midwife);

        let a = send(&env, &doctor, &mom, MessageType::Text).await;
        send(&env, &doctor, &mom, MessageType::Text).await;
        let b = send(&env, &midwife, &mom, MessageType::Text).await;
        send(&env, &mom, &midwife, MessageType::Text).await;

        let summary = ConversationService::new(&env.ctx)
            .unread_summary(mom.id)
            .await
            .unwrap();
        assert_eq!(summary.total_unread, 3);
        assert_eq!(summary.by_conversation.get(&a.to_string()), Some(&2));
        assert_eq!(summary.by_conversation.get(&b.to_string()), Some(&1));
    }

    #[tokio::test]
    async fn test_stats_count_by_type() {
        let env = TestContext::new();
        let mom = env.add_user("Ada", UserRole::Mom);
        let doctor = env.add_user("Dr. Bea", UserRole::Doctor);
        let id = send(&env, &mom, &doctor, MessageType::Text).await;
        send(&env, &doctor, &mom, MessageType::Text).await;
        send(&env, &mom, &doctor, MessageType::Image).await;

        let stats = ConversationService::new(&env.ctx)
            .conversation_stats(id, doctor.id)
            .await
            .unwrap();
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.by_type.get("text"), Some(&2));
        assert_eq!(stats.by_type.get("image"), Some(&1));
        assert_eq!(stats.by_type.get("video"), None);
    }

    #[tokio::test]
    async fn test_participants_carry_presence() {
        let env = TestContext::new();
        let mom = env.add_user("Ada", UserRole::Mom);
        let doctor = env.add_user("Dr. Bea", UserRole::Doctor);
        let id = send(&env, &mom, &doctor, MessageType::Text).await;
        env.presence.register(doctor.id, "s1").await.unwrap();

        let participants = ConversationService::new(&env.ctx)
            .participants(id, mom.id)
            .await
            .unwrap();
        assert_eq!(participants.len(), 2);
        let status_of = |user: Snowflake| {
            participants
                .iter()
                .find(|p| p.user.id == user)
                .map(|p| p.status)
        };
        assert_eq!(status_of(doctor.id), Some(PresenceStatus::Online));
        assert_eq!(status_of(mom.id), Some(PresenceStatus::Offline));
    }

    #[tokio::test]
    async fn test_typing_goes_to_counterpart() {
        let env = TestContext::new();
        let mom = env.add_user("Ada", UserRole::Mom);
        let doctor = env.add_user("Dr. Bea", UserRole::Doctor);
        let id = send(&env, &mom, &doctor, MessageType::Text).await;

        let other = ConversationService::new(&env.ctx)
            .typing(id, mom.id, true)
            .await
            .unwrap();
        assert_eq!(other, doctor.id);

        let typing = env.notifier.of_kind(ChatEventKind::TypingIndicator).await;
        assert_eq!(typing[0].target, Target::Users(vec![doctor.id]));
        assert_eq!(typing[0].event.payload["isTyping"], true);
        assert_eq!(typing[0].event.conversation_id(), Some(id.to_string().as_str()));
    }
}
