//! Ports implemented by the infrastructure crates

mod clock;
mod notifier;
mod presence;
mod repositories;

pub use clock::{Clock, SystemClock};
pub use notifier::{EventNotifier, NoopNotifier};
pub use presence::PresenceRegistry;
pub use repositories::{
    ConversationRepository, MessageQuery, MessageRepository, ReactionRepository, RepoResult,
    UserDirectory,
};
