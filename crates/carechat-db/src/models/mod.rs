//! Database models - SQLx-compatible structs for PostgreSQL tables

mod conversation;
mod message;
mod reaction;
mod user;

pub use conversation::ConversationModel;
pub use message::{MessageModel, TypeCountModel};
pub use reaction::ReactionModel;
pub use user::UserModel;
