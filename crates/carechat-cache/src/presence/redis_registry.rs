//! Presence registry shared by every gateway instance through Redis.
//!
//! Live sessions are a sorted set per user scored by their expiry time; the
//! advertised status is a plain key that exists only while the user has
//! sessions. Heartbeats push both forward, so sessions left behind by a
//! crashed instance lapse on their own.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use carechat_core::traits::{PresenceRegistry, RepoResult};
use carechat_core::{PresenceStatus, Snowflake};
use redis::AsyncCommands;

use crate::pool::{RedisPool, RedisPoolError};

/// Key prefix for a user's live session ids
const SESSIONS_PREFIX: &str = "presence:sessions:";
/// Key prefix for a user's advertised status
const STATUS_PREFIX: &str = "presence:status:";
/// Presence TTL in seconds (5 minutes, refreshed by heartbeat)
const PRESENCE_TTL: u64 = 300;

#[derive(Clone, Debug)]
pub struct RedisPresenceRegistry {
    pool: RedisPool,
}

impl RedisPresenceRegistry {
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn sessions_key(user_id: Snowflake) -> String {
        format!("{SESSIONS_PREFIX}{user_id}")
    }

    fn status_key(user_id: Snowflake) -> String {
        format!("{STATUS_PREFIX}{user_id}")
    }

    fn now_secs() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64)
    }

    /// Score of a session refreshed at `now`
    fn expiry(now: i64) -> i64 {
        now + PRESENCE_TTL as i64
    }
}

#[async_trait]
impl PresenceRegistry for RedisPresenceRegistry {
    async fn register(&self, user_id: Snowflake, session_id: &str) -> RepoResult<bool> {
        let mut conn = self.pool.get().await?;
        let key = Self::sessions_key(user_id);
        let now = Self::now_secs();

        // Expired sessions are pruned first so they never hide a first session
        let (added, count): (i64, i64) = redis::pipe()
            .atomic()
            .zrembyscore(&key, "-inf", now)
            .ignore()
            .zadd(&key, session_id, Self::expiry(now))
            .zcard(&key)
            .expire(&key, PRESENCE_TTL as i64)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(RedisPoolError::from)?;

        let first = added == 1 && count == 1;
        if first {
            conn.set_ex::<_, _, ()>(
                Self::status_key(user_id),
                PresenceStatus::Online.as_str(),
                PRESENCE_TTL,
            )
            .await
            .map_err(RedisPoolError::from)?;
        }

        tracing::debug!(user_id = %user_id, sessions = count, "Registered presence session");
        Ok(first)
    }

    async fn unregister(&self, user_id: Snowflake, session_id: &str) -> RepoResult<bool> {
        let mut conn = self.pool.get().await?;
        let key = Self::sessions_key(user_id);

        let (removed, count): (i64, i64) = redis::pipe()
            .atomic()
            .zrembyscore(&key, "-inf", Self::now_secs())
            .ignore()
            .zrem(&key, session_id)
            .zcard(&key)
            .query_async(&mut conn)
            .await
            .map_err(RedisPoolError::from)?;

        if count == 0 {
            conn.del::<_, ()>(Self::status_key(user_id))
                .await
                .map_err(RedisPoolError::from)?;
        }

        tracing::debug!(user_id = %user_id, sessions = count, "Removed presence session");
        Ok(removed == 1 && count == 0)
    }

    async fn refresh(&self, user_id: Snowflake, session_id: &str) -> RepoResult<()> {
        let mut conn = self.pool.get().await?;
        let key = Self::sessions_key(user_id);

        redis::pipe()
            .atomic()
            .zadd(&key, session_id, Self::expiry(Self::now_secs()))
            .ignore()
            .expire(&key, PRESENCE_TTL as i64)
            .ignore()
            .expire(Self::status_key(user_id), PRESENCE_TTL as i64)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(RedisPoolError::from)?;
        Ok(())
    }

    async fn sessions(&self, user_id: Snowflake) -> RepoResult<Vec<String>> {
        let mut conn = self.pool.get().await?;
        let sessions: Vec<String> = conn
            .zrangebyscore(Self::sessions_key(user_id), Self::now_secs(), "+inf")
            .await
            .map_err(RedisPoolError::from)?;
        Ok(sessions)
    }

    async fn set_status(&self, user_id: Snowflake, status: PresenceStatus) -> RepoResult<()> {
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(Self::status_key(user_id), status.as_str(), PRESENCE_TTL)
            .await
            .map_err(RedisPoolError::from)?;
        Ok(())
    }

    async fn status(&self, user_id: Snowflake) -> RepoResult<PresenceStatus> {
        let mut conn = self.pool.get().await?;
        let raw: Option<String> = conn
            .get(Self::status_key(user_id))
            .await
            .map_err(RedisPoolError::from)?;

        // A status value we cannot read is treated as absent
        Ok(raw
            .and_then(|s| s.parse().ok())
            .unwrap_or(PresenceStatus::Offline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let user = Snowflake::new(42);
        assert_eq!(RedisPresenceRegistry::sessions_key(user), "presence:sessions:42");
        assert_eq!(RedisPresenceRegistry::status_key(user), "presence:status:42");
    }

    #[test]
    fn test_sessions_expire_after_ttl() {
        let now = RedisPresenceRegistry::now_secs();
        assert!(now > 0);
        assert_eq!(RedisPresenceRegistry::expiry(now) - now, 300);
    }

    /// Needs a Redis server; skipped when `REDIS_URL` is unset
    async fn test_registry() -> Option<RedisPresenceRegistry> {
        let url = std::env::var("REDIS_URL").ok()?;
        let pool = RedisPool::from_config(&carechat_common::RedisConfig {
            url,
            max_connections: 2,
        })
        .ok()?;
        pool.health_check().await.ok()?;
        Some(RedisPresenceRegistry::new(pool))
    }

    #[tokio::test]
    async fn test_stale_session_does_not_block_first_session() {
        let Some(registry) = test_registry().await else {
            eprintln!("Skipping test: REDIS_URL not set");
            return;
        };
        let user = Snowflake::new(RedisPresenceRegistry::now_secs() * 1000 + 7);
        let key = RedisPresenceRegistry::sessions_key(user);

        // A session a crashed instance never removed, already past its expiry
        let mut conn = registry.pool.get().await.unwrap();
        conn.zadd::<_, _, _, ()>(&key, "crashed", RedisPresenceRegistry::now_secs() - 1)
            .await
            .unwrap();

        assert!(registry.register(user, "fresh").await.unwrap());
        assert_eq!(registry.sessions(user).await.unwrap(), vec!["fresh".to_string()]);
        assert_eq!(registry.status(user).await.unwrap(), PresenceStatus::Online);

        registry.refresh(user, "fresh").await.unwrap();
        let ttl: i64 = conn.ttl(RedisPresenceRegistry::status_key(user)).await.unwrap();
        assert!(ttl > 0 && ttl <= 300);

        assert!(registry.unregister(user, "fresh").await.unwrap());
        assert_eq!(registry.status(user).await.unwrap(), PresenceStatus::Offline);
    }
}
