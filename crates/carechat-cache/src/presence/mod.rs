//! Presence registries.

mod memory;
mod redis_registry;

pub use memory::InMemoryPresenceRegistry;
pub use redis_registry::RedisPresenceRegistry;
