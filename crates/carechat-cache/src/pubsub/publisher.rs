//! Redis Pub/Sub publisher and the notifier built on it.

use async_trait::async_trait;
use carechat_core::{ChatEvent, EventNotifier, Snowflake};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::pool::{RedisPool, RedisResult};
use crate::pubsub::PubSubChannel;

/// Envelope carried on a Pub/Sub channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubSubEvent {
    pub event: ChatEvent,
    /// User whose connections skip a broadcast
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub except: Option<Snowflake>,
}

impl PubSubEvent {
    #[must_use]
    pub fn new(event: ChatEvent) -> Self {
        Self {
            event,
            except: None,
        }
    }

    #[must_use]
    pub fn except(mut self, user_id: Option<Snowflake>) -> Self {
        self.except = user_id;
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Redis Pub/Sub publisher
#[derive(Clone, Debug)]
pub struct Publisher {
    pool: RedisPool,
}

impl Publisher {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Publish an event to a channel, returning the number of subscribers reached
    pub async fn publish(&self, channel: &PubSubChannel, event: &PubSubEvent) -> RedisResult<u32> {
        let payload = event.to_json()?;
        let mut conn = self.pool.get().await?;
        let channel_name = channel.name();

        let receivers: u32 = conn.publish(&channel_name, &payload).await?;

        tracing::debug!(
            channel = %channel_name,
            event = %event.event.kind,
            receivers,
            "Published event"
        );

        Ok(receivers)
    }

    /// Publish the same event to several channels over one connection
    pub async fn publish_many(
        &self,
        channels: &[PubSubChannel],
        event: &PubSubEvent,
    ) -> RedisResult<u32> {
        let payload = event.to_json()?;
        let mut conn = self.pool.get().await?;
        let mut total_receivers = 0;

        for channel in channels {
            let receivers: u32 = conn.publish(channel.name(), &payload).await?;
            total_receivers += receivers;
        }

        Ok(total_receivers)
    }
}

/// [`EventNotifier`] for multi-instance deployments: every gateway subscribed to a
/// user's channel delivers to the connections it holds.
#[derive(Clone, Debug)]
pub struct RedisNotifier {
    publisher: Publisher,
}

impl RedisNotifier {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self {
            publisher: Publisher::new(pool),
        }
    }
}

#[async_trait]
impl EventNotifier for RedisNotifier {
    async fn notify(&self, recipients: &[Snowflake], event: ChatEvent) {
        if recipients.is_empty() {
            return;
        }
        let kind = event.kind;
        let channels: Vec<PubSubChannel> =
            recipients.iter().copied().map(PubSubChannel::user).collect();

        // Delivery is best effort; clients catch up over REST
        if let Err(e) = self
            .publisher
            .publish_many(&channels, &PubSubEvent::new(event))
            .await
        {
            tracing::warn!(event = %kind, error = %e, "Failed to publish chat event");
        }
    }

    async fn broadcast(&self, event: ChatEvent, except: Option<Snowflake>) {
        let kind = event.kind;
        let envelope = PubSubEvent::new(event).except(except);
        if let Err(e) = self
            .publisher
            .publish(&PubSubChannel::broadcast(), &envelope)
            .await
        {
            tracing::warn!(event = %kind, error = %e, "Failed to publish broadcast");
        }
    }
}
