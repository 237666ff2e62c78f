//! # carechat-core
//!
//! Domain layer for the care-team chat: conversations between two participants,
//! their messages, presence, and the repository/notifier ports the outer layers implement.
//! This crate has zero dependencies on infrastructure (database, web framework, etc.).

pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Attachment, ChatType, Conversation, LastMessage, Message, MessageStatus, MessageType,
    PresenceStatus, Reaction, User, UserRole, MAX_CONTENT_LENGTH,
};
pub use error::DomainError;
pub use events::{ChatEvent, ChatEventKind};
pub use traits::{
    Clock, ConversationRepository, EventNotifier, MessageQuery, MessageRepository, NoopNotifier,
    PresenceRegistry, ReactionRepository, RepoResult, SystemClock, UserDirectory,
};
pub use value_objects::{ConversationKey, Snowflake, SnowflakeGenerator, SnowflakeParseError};
