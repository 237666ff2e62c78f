//! Redis Pub/Sub fan-out between service and gateway instances.

mod channels;
mod publisher;
mod subscriber;

pub use channels::{PubSubChannel, BROADCAST_CHANNEL, USER_CHANNEL_PREFIX};
pub use publisher::{PubSubEvent, Publisher, RedisNotifier};
pub use subscriber::{
    ReceivedMessage, Subscriber, SubscriberConfig, SubscriberError, SubscriberResult,
};
