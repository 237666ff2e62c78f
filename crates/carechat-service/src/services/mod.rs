//! Business logic services
//!
//! Each service borrows the shared [`ServiceContext`] and is cheap to build
//! per request or per gateway event.

pub mod context;
pub mod conversation;
pub mod directory;
pub mod error;
mod events;
pub mod messaging;
pub mod presence;

pub use context::{ServiceContext, ServiceContextBuilder};
pub use conversation::ConversationService;
pub use directory::DirectoryService;
pub use error::{ServiceError, ServiceResult};
pub use messaging::MessagingService;
pub use presence::PresenceService;
