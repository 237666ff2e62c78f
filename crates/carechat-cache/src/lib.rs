//! # carechat-cache
//!
//! Redis-backed pieces shared by every chat instance: presence and Pub/Sub
//! fan-out. The in-memory presence registry for single-process deployments
//! lives here too so both implementations sit side by side.
//!
//! ```ignore
//! use carechat_cache::{RedisPool, RedisPresenceRegistry, RedisNotifier};
//!
//! let pool = RedisPool::from_config(&redis_config)?;
//! let presence = RedisPresenceRegistry::new(pool.clone());
//! let notifier = RedisNotifier::new(pool);
//! ```

pub mod pool;
pub mod presence;
pub mod pubsub;

pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult, SharedRedisPool};
pub use presence::{InMemoryPresenceRegistry, RedisPresenceRegistry};
pub use pubsub::{
    PubSubChannel, PubSubEvent, Publisher, ReceivedMessage, RedisNotifier, Subscriber,
    SubscriberConfig, SubscriberError, SubscriberResult, BROADCAST_CHANNEL, USER_CHANNEL_PREFIX,
};
