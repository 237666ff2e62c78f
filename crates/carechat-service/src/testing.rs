//! In-memory doubles for service, gateway and end-to-end tests
//!
//! [`InMemoryChatStore`] implements the three chat stores over shared maps and
//! mirrors the Postgres behavior that matters to callers: one conversation per
//! pair under concurrent first contact, reactions cascading with their message
//! and replies losing their target on delete.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use carechat_cache::InMemoryPresenceRegistry;
use carechat_common::ChatConfig;
use carechat_core::traits::{MessageQuery, RepoResult};
use carechat_core::{
    ChatEvent, ChatEventKind, Clock, Conversation, ConversationKey, ConversationRepository,
    DomainError, EventNotifier, LastMessage, Message, MessageRepository, MessageStatus,
    MessageType, Reaction, ReactionRepository, Snowflake, SnowflakeGenerator, User,
    UserDirectory, UserRole,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::services::ServiceContext;

// ============================================================================
// Chat store
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryChatStore {
    conversations: DashMap<Snowflake, Conversation>,
    keys: DashMap<ConversationKey, Snowflake>,
    messages: DashMap<Snowflake, Message>,
    reactions: DashMap<(Snowflake, Snowflake), Reaction>,
    fail_conversation_updates: AtomicBool,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `update_last_message` and `increment_unread` fail with a storage error
    pub fn fail_conversation_updates(&self, fail: bool) {
        self.fail_conversation_updates.store(fail, Ordering::SeqCst);
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    fn check_updates(&self) -> RepoResult<()> {
        if self.fail_conversation_updates.load(Ordering::SeqCst) {
            return Err(DomainError::Storage("injected conversation update failure".into()));
        }
        Ok(())
    }

    fn with_conversation<T>(
        &self,
        id: Snowflake,
        f: impl FnOnce(&mut Conversation) -> T,
    ) -> RepoResult<T> {
        let mut conversation = self
            .conversations
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("Conversation", id))?;
        Ok(f(&mut conversation))
    }

    fn with_message(&self, message: &Message, f: impl FnOnce(&mut Message)) -> RepoResult<()> {
        let mut stored = self
            .messages
            .get_mut(&message.id)
            .ok_or_else(|| DomainError::not_found("Message", message.id))?;
        f(&mut stored);
        Ok(())
    }

    fn sorted_reactions(&self, filter: impl Fn(&Reaction) -> bool) -> Vec<Reaction> {
        let mut reactions: Vec<Reaction> = self
            .reactions
            .iter()
            .filter(|r| filter(r.value()))
            .map(|r| r.value().clone())
            .collect();
        reactions.sort_by_key(|r| (r.message_id, r.created_at, r.user_id));
        reactions
    }
}

#[async_trait]
impl ConversationRepository for InMemoryChatStore {
    async fn find_or_create(
        &self,
        a: Snowflake,
        b: Snowflake,
        new_id: Snowflake,
        now: DateTime<Utc>,
    ) -> RepoResult<(Conversation, bool)> {
        let key = ConversationKey::for_pair(a, b)?;
        // The entry guard serializes racing first contacts on the same key
        match self.keys.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                let id = *entry.get();
                drop(entry);
                let conversation = self
                    .conversations
                    .get(&id)
                    .map(|c| c.clone())
                    .ok_or_else(|| DomainError::not_found("Conversation", id))?;
                Ok((conversation, false))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let conversation = Conversation::new_direct(new_id, key, now);
                self.conversations.insert(new_id, conversation.clone());
                entry.insert(new_id);
                Ok((conversation, true))
            }
        }
    }

    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Conversation>> {
        Ok(self.conversations.get(&id).map(|c| c.clone()))
    }

    async fn find_by_key(&self, key: &ConversationKey) -> RepoResult<Option<Conversation>> {
        let id = match self.keys.get(key) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.conversations.get(&id).map(|c| c.clone()))
    }

    async fn find_by_user(&self, user_id: Snowflake) -> RepoResult<Vec<Conversation>> {
        let mut found: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|c| c.is_active && c.is_participant(user_id))
            .map(|c| c.clone())
            .collect();
        found.sort_by(|a, b| b.last_activity.cmp(&a.last_activity).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    async fn update_last_message(
        &self,
        id: Snowflake,
        snapshot: &LastMessage,
        now: DateTime<Utc>,
    ) -> RepoResult<()> {
        self.check_updates()?;
        self.with_conversation(id, |c| c.record_message(snapshot.clone(), now))
    }

    async fn increment_unread(&self, id: Snowflake, participant: Snowflake) -> RepoResult<i64> {
        self.check_updates()?;
        self.with_conversation(id, |c| c.increment_unread(participant))
    }

    async fn reset_unread(&self, id: Snowflake, participant: Snowflake) -> RepoResult<()> {
        self.with_conversation(id, |c| c.reset_unread(participant))
    }

    async fn toggle_mute(&self, id: Snowflake, participant: Snowflake) -> RepoResult<bool> {
        self.with_conversation(id, |c| c.toggle_mute(participant))
    }

    async fn toggle_pin(&self, id: Snowflake, participant: Snowflake) -> RepoResult<bool> {
        self.with_conversation(id, |c| c.toggle_pin(participant))
    }

    async fn set_active(&self, id: Snowflake, active: bool) -> RepoResult<()> {
        self.with_conversation(id, |c| c.is_active = active)
    }
}

#[async_trait]
impl MessageRepository for InMemoryChatStore {
    async fn create(&self, message: &Message) -> RepoResult<()> {
        if !self.conversations.contains_key(&message.conversation_id) {
            return Err(DomainError::not_found("Conversation", message.conversation_id));
        }
        let mut stored = message.clone();
        stored.reactions.clear();
        self.messages.insert(message.id, stored);
        Ok(())
    }

    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>> {
        Ok(self.messages.get(&id).map(|m| m.clone()))
    }

    async fn find_history(
        &self,
        key: &ConversationKey,
        query: MessageQuery,
    ) -> RepoResult<Vec<Message>> {
        let mut page: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| &m.conversation_key == key)
            .filter(|m| query.before.map_or(true, |before| m.id < before))
            .filter(|m| query.after.map_or(true, |after| m.id > after))
            .map(|m| m.clone())
            .collect();
        page.sort_by_key(|m| m.id);

        let limit = query.limit.max(1) as usize;
        if query.after.is_some() {
            page.truncate(limit);
        } else if page.len() > limit {
            page.drain(..page.len() - limit);
        }
        Ok(page)
    }

    async fn count_in_conversation(&self, key: &ConversationKey) -> RepoResult<i64> {
        Ok(self
            .messages
            .iter()
            .filter(|m| &m.conversation_key == key)
            .count() as i64)
    }

    async fn count_by_type(&self, key: &ConversationKey) -> RepoResult<Vec<(MessageType, i64)>> {
        Ok(MessageType::ALL
            .into_iter()
            .map(|message_type| {
                let count = self
                    .messages
                    .iter()
                    .filter(|m| &m.conversation_key == key && m.message_type == message_type)
                    .count() as i64;
                (message_type, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect())
    }

    async fn update_content(&self, message: &Message) -> RepoResult<()> {
        self.with_message(message, |stored| {
            stored.content.clone_from(&message.content);
            stored.is_edited = message.is_edited;
            stored.edited_at = message.edited_at;
            stored.original_content.clone_from(&message.original_content);
            stored.updated_at = message.updated_at;
        })
    }

    async fn update_status(&self, message: &Message, expected: MessageStatus) -> RepoResult<bool> {
        let Some(mut stored) = self.messages.get_mut(&message.id) else {
            return Ok(false);
        };
        if stored.status != expected {
            return Ok(false);
        }
        stored.status = message.status;
        stored.is_read = message.is_read;
        stored.read_at = message.read_at;
        stored.updated_at = message.updated_at;
        Ok(true)
    }

    async fn mark_read_for_recipient(
        &self,
        key: &ConversationKey,
        recipient: Snowflake,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<Snowflake>> {
        let mut changed = Vec::new();
        for mut message in self.messages.iter_mut() {
            if &message.conversation_key == key && message.recipient_id == recipient && !message.is_read {
                message.is_read = true;
                message.status = MessageStatus::Read;
                message.read_at = Some(now);
                message.updated_at = now;
                changed.push(message.id);
            }
        }
        changed.sort_unstable();
        Ok(changed)
    }

    async fn delete(&self, id: Snowflake) -> RepoResult<bool> {
        if self.messages.remove(&id).is_none() {
            return Ok(false);
        }
        self.reactions.retain(|(message_id, _), _| *message_id != id);
        for mut message in self.messages.iter_mut() {
            if message.reply_to == Some(id) {
                message.reply_to = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl ReactionRepository for InMemoryChatStore {
    async fn upsert(&self, reaction: &Reaction) -> RepoResult<()> {
        if !self.messages.contains_key(&reaction.message_id) {
            return Err(DomainError::not_found("Message", reaction.message_id));
        }
        self.reactions
            .insert((reaction.message_id, reaction.user_id), reaction.clone());
        Ok(())
    }

    async fn remove(&self, message_id: Snowflake, user_id: Snowflake) -> RepoResult<bool> {
        Ok(self.reactions.remove(&(message_id, user_id)).is_some())
    }

    async fn list_for_message(&self, message_id: Snowflake) -> RepoResult<Vec<Reaction>> {
        Ok(self.sorted_reactions(|r| r.message_id == message_id))
    }

    async fn list_for_messages(&self, message_ids: &[Snowflake]) -> RepoResult<Vec<Reaction>> {
        Ok(self.sorted_reactions(|r| message_ids.contains(&r.message_id)))
    }
}

// ============================================================================
// User directory
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<Snowflake, User>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        self.users.insert(user.id, user);
    }

    fn sorted(&self, filter: impl Fn(&User) -> bool) -> Vec<User> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|u| u.is_active && filter(u.value()))
            .map(|u| u.clone())
            .collect();
        users.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.id.cmp(&b.id)));
        users
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_many(&self, ids: &[Snowflake]) -> RepoResult<Vec<User>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| u.clone()))
            .collect())
    }

    async fn search(
        &self,
        query: &str,
        role: Option<UserRole>,
        exclude: Snowflake,
        limit: i64,
    ) -> RepoResult<Vec<User>> {
        let needle = query.to_lowercase();
        let mut users = self.sorted(|u| {
            u.id != exclude && role.map_or(true, |r| u.role == r) && u.matches(&needle)
        });
        users.truncate(limit.max(0) as usize);
        Ok(users)
    }

    async fn list_by_roles(&self, roles: &[UserRole], exclude: Snowflake) -> RepoResult<Vec<User>> {
        Ok(self.sorted(|u| u.id != exclude && roles.contains(&u.role)))
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(start.timestamp_micros()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let step = by.num_microseconds().unwrap_or(i64::MAX);
        self.micros.fetch_add(step, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

// ============================================================================
// Notifier
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Users(Vec<Snowflake>),
    Broadcast { except: Option<Snowflake> },
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub target: Target,
    pub event: ChatEvent,
}

/// Notifier that keeps every emission for later assertions
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<Recorded> {
        self.events.lock().await.clone()
    }

    pub async fn of_kind(&self, kind: ChatEventKind) -> Vec<Recorded> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|r| r.event.kind == kind)
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

#[async_trait]
impl EventNotifier for RecordingNotifier {
    async fn notify(&self, recipients: &[Snowflake], event: ChatEvent) {
        self.events.lock().await.push(Recorded {
            target: Target::Users(recipients.to_vec()),
            event,
        });
    }

    async fn broadcast(&self, event: ChatEvent, except: Option<Snowflake>) {
        self.events.lock().await.push(Recorded {
            target: Target::Broadcast { except },
            event,
        });
    }
}

// ============================================================================
// Assembled context
// ============================================================================

/// A [`ServiceContext`] over in-memory doubles, with handles to each of them
#[derive(Clone)]
pub struct TestContext {
    pub ctx: ServiceContext,
    pub store: Arc<InMemoryChatStore>,
    pub users: Arc<InMemoryUserDirectory>,
    pub presence: Arc<InMemoryPresenceRegistry>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    ids: Arc<SnowflakeGenerator>,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryChatStore::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let presence = Arc::new(InMemoryPresenceRegistry::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let ids = Arc::new(SnowflakeGenerator::new(1));

        Self {
            ctx: Self::assemble(&store, &users, &presence, notifier.clone(), &clock, &ids),
            store,
            users,
            presence,
            notifier,
            clock,
            ids,
        }
    }

    /// A second context over the same stores that fans out through `notifier`
    pub fn context_with(&self, notifier: Arc<dyn EventNotifier>) -> ServiceContext {
        Self::assemble(
            &self.store,
            &self.users,
            &self.presence,
            notifier,
            &self.clock,
            &self.ids,
        )
    }

    fn assemble(
        store: &Arc<InMemoryChatStore>,
        users: &Arc<InMemoryUserDirectory>,
        presence: &Arc<InMemoryPresenceRegistry>,
        notifier: Arc<dyn EventNotifier>,
        clock: &Arc<ManualClock>,
        ids: &Arc<SnowflakeGenerator>,
    ) -> ServiceContext {
        let built = ServiceContext::builder()
            .conversation_repo(store.clone())
            .message_repo(store.clone())
            .reaction_repo(store.clone())
            .user_directory(users.clone())
            .presence(presence.clone())
            .notifier(notifier)
            .clock(clock.clone())
            .snowflake_generator(ids.clone())
            .chat_config(ChatConfig::default())
            .build();
        match built {
            Ok(ctx) => ctx,
            Err(e) => unreachable!("all dependencies are provided: {e}"),
        }
    }

    /// Seed a directory user with a fresh id
    pub fn add_user(&self, name: &str, role: UserRole) -> User {
        let id = self.ids.generate();
        let email = format!("{}@carechat.test", name.to_lowercase().replace(' ', "."));
        let user = User::new(id, name.to_string(), email, role);
        self.users.insert(user.clone());
        user
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
