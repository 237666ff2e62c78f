//! Domain entities - core business objects

mod conversation;
mod message;
mod reaction;
mod user;

pub use conversation::{ChatType, Conversation, LastMessage};
pub use message::{Attachment, Message, MessageStatus, MessageType, MAX_CONTENT_LENGTH};
pub use reaction::Reaction;
pub use user::{PresenceStatus, User, UserRole};
