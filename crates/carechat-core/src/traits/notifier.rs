//! Event notifier port - how the messaging layer reaches connected clients

use async_trait::async_trait;

use crate::events::ChatEvent;
use crate::value_objects::Snowflake;

/// Fan-out sink for [`ChatEvent`]s.
///
/// Delivery is fire-and-forget: offline targets and closed connections are
/// skipped silently, so neither method returns an error.
#[async_trait]
pub trait EventNotifier: Send + Sync {
    /// Deliver to every live connection of the given users
    async fn notify(&self, recipients: &[Snowflake], event: ChatEvent);

    /// Deliver to every live connection, optionally skipping one user
    async fn broadcast(&self, event: ChatEvent, except: Option<Snowflake>);
}

/// Notifier for processes without a gateway
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl EventNotifier for NoopNotifier {
    async fn notify(&self, _recipients: &[Snowflake], _event: ChatEvent) {}

    async fn broadcast(&self, _event: ChatEvent, _except: Option<Snowflake>) {}
}
