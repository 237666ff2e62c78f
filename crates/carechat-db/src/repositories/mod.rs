//! Repository implementations
//!
//! PostgreSQL implementations of the store traits defined in carechat-core.

mod conversation;
mod error;
mod message;
mod reaction;
mod user;

pub use conversation::PgConversationRepository;
pub use message::PgMessageRepository;
pub use reaction::PgReactionRepository;
pub use user::PgUserDirectory;
