//! Pub/Sub channel naming.
//!
//! Every chat event is addressed either to one user (all of their sessions, on
//! whichever gateway instance holds them) or to everyone.

use carechat_core::Snowflake;

/// Channel prefix for user-specific events
pub const USER_CHANNEL_PREFIX: &str = "carechat:user:";
/// Channel for events delivered to every connected client
pub const BROADCAST_CHANNEL: &str = "carechat:broadcast";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PubSubChannel {
    User(Snowflake),
    Broadcast,
}

impl PubSubChannel {
    #[must_use]
    pub fn user(user_id: Snowflake) -> Self {
        Self::User(user_id)
    }

    #[must_use]
    pub fn broadcast() -> Self {
        Self::Broadcast
    }

    /// Get the Redis channel name
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::User(id) => format!("{USER_CHANNEL_PREFIX}{id}"),
            Self::Broadcast => BROADCAST_CHANNEL.to_string(),
        }
    }

    /// Parse a channel name back; foreign channels yield `None`
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name == BROADCAST_CHANNEL {
            return Some(Self::Broadcast);
        }
        name.strip_prefix(USER_CHANNEL_PREFIX)
            .and_then(|id| Snowflake::parse(id).ok())
            .map(Self::User)
    }
}

impl std::fmt::Display for PubSubChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}
