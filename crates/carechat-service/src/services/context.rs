//! Service context - dependency container for services
//!
//! Holds the stores, presence registry, notifier and clock the services need.
//! Everything is behind a trait object so the same services run over Postgres
//! and Redis in production and over in-memory doubles in tests.

use std::sync::Arc;

use carechat_common::ChatConfig;
use carechat_core::{
    Clock, ConversationRepository, EventNotifier, MessageRepository, PresenceRegistry,
    ReactionRepository, Snowflake, SnowflakeGenerator, SystemClock, UserDirectory,
};

use super::error::{ServiceError, ServiceResult};

/// Service context containing all dependencies
#[derive(Clone)]
pub struct ServiceContext {
    // Stores
    conversation_repo: Arc<dyn ConversationRepository>,
    message_repo: Arc<dyn MessageRepository>,
    reaction_repo: Arc<dyn ReactionRepository>,
    user_directory: Arc<dyn UserDirectory>,

    // Real-time
    presence: Arc<dyn PresenceRegistry>,
    notifier: Arc<dyn EventNotifier>,

    clock: Arc<dyn Clock>,
    snowflake_generator: Arc<SnowflakeGenerator>,
    chat: ChatConfig,
}

impl ServiceContext {
    /// Start building a context
    pub fn builder() -> ServiceContextBuilder {
        ServiceContextBuilder::new()
    }

    // === Stores ===

    pub fn conversation_repo(&self) -> &dyn ConversationRepository {
        self.conversation_repo.as_ref()
    }

    pub fn message_repo(&self) -> &dyn MessageRepository {
        self.message_repo.as_ref()
    }

    pub fn reaction_repo(&self) -> &dyn ReactionRepository {
        self.reaction_repo.as_ref()
    }

    pub fn user_directory(&self) -> &dyn UserDirectory {
        self.user_directory.as_ref()
    }

    // === Real-time ===

    pub fn presence(&self) -> &dyn PresenceRegistry {
        self.presence.as_ref()
    }

    /// Shared handle, for components that outlive a borrowed service
    pub fn presence_handle(&self) -> Arc<dyn PresenceRegistry> {
        Arc::clone(&self.presence)
    }

    pub fn notifier(&self) -> &dyn EventNotifier {
        self.notifier.as_ref()
    }

    // === Time, ids, settings ===

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Generate a new Snowflake ID
    pub fn generate_id(&self) -> Snowflake {
        self.snowflake_generator.generate()
    }

    pub fn chat_config(&self) -> &ChatConfig {
        &self.chat
    }

    pub fn edit_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.chat.edit_window_minutes)
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("repositories", &"...")
            .field("presence", &"dyn PresenceRegistry")
            .field("notifier", &"dyn EventNotifier")
            .field("chat", &self.chat)
            .finish()
    }
}

/// Builder for creating ServiceContext
///
/// The clock defaults to [`SystemClock`] and chat settings to
/// [`ChatConfig::default`]; every other dependency is required.
pub struct ServiceContextBuilder {
    conversation_repo: Option<Arc<dyn ConversationRepository>>,
    message_repo: Option<Arc<dyn MessageRepository>>,
    reaction_repo: Option<Arc<dyn ReactionRepository>>,
    user_directory: Option<Arc<dyn UserDirectory>>,
    presence: Option<Arc<dyn PresenceRegistry>>,
    notifier: Option<Arc<dyn EventNotifier>>,
    clock: Option<Arc<dyn Clock>>,
    snowflake_generator: Option<Arc<SnowflakeGenerator>>,
    chat: Option<ChatConfig>,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self {
            conversation_repo: None,
            message_repo: None,
            reaction_repo: None,
            user_directory: None,
            presence: None,
            notifier: None,
            clock: None,
            snowflake_generator: None,
            chat: None,
        }
    }

    pub fn conversation_repo(mut self, repo: Arc<dyn ConversationRepository>) -> Self {
        self.conversation_repo = Some(repo);
        self
    }

    pub fn message_repo(mut self, repo: Arc<dyn MessageRepository>) -> Self {
        self.message_repo = Some(repo);
        self
    }

    pub fn reaction_repo(mut self, repo: Arc<dyn ReactionRepository>) -> Self {
        self.reaction_repo = Some(repo);
        self
    }

    pub fn user_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.user_directory = Some(directory);
        self
    }

    pub fn presence(mut self, presence: Arc<dyn PresenceRegistry>) -> Self {
        self.presence = Some(presence);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn snowflake_generator(mut self, generator: Arc<SnowflakeGenerator>) -> Self {
        self.snowflake_generator = Some(generator);
        self
    }

    pub fn chat_config(mut self, chat: ChatConfig) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Build the ServiceContext
    ///
    /// # Errors
    /// Returns `ServiceError::Validation` if any required dependency is missing
    pub fn build(self) -> ServiceResult<ServiceContext> {
        let chat = self.chat.unwrap_or_default();
        if chat.edit_window_minutes <= 0 {
            return Err(ServiceError::validation("edit window must be positive"));
        }

        Ok(ServiceContext {
            conversation_repo: self
                .conversation_repo
                .ok_or_else(|| ServiceError::validation("conversation_repo is required"))?,
            message_repo: self
                .message_repo
                .ok_or_else(|| ServiceError::validation("message_repo is required"))?,
            reaction_repo: self
                .reaction_repo
                .ok_or_else(|| ServiceError::validation("reaction_repo is required"))?,
            user_directory: self
                .user_directory
                .ok_or_else(|| ServiceError::validation("user_directory is required"))?,
            presence: self
                .presence
                .ok_or_else(|| ServiceError::validation("presence is required"))?,
            notifier: self
                .notifier
                .ok_or_else(|| ServiceError::validation("notifier is required"))?,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            snowflake_generator: self
                .snowflake_generator
                .ok_or_else(|| ServiceError::validation("snowflake_generator is required"))?,
            chat,
        })
    }
}

impl Default for ServiceContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
