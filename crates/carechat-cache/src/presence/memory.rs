//! Process-local presence registry for single-instance deployments.

use async_trait::async_trait;
use carechat_core::traits::{PresenceRegistry, RepoResult};
use carechat_core::{PresenceStatus, Snowflake};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct InMemoryPresenceRegistry {
    sessions: DashMap<Snowflake, HashSet<String>>,
    statuses: DashMap<Snowflake, PresenceStatus>,
}

impl InMemoryPresenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn online_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl PresenceRegistry for InMemoryPresenceRegistry {
    async fn register(&self, user_id: Snowflake, session_id: &str) -> RepoResult<bool> {
        // The status is written under the sessions shard lock so a racing
        // unregister cannot clear it for a connected user
        let mut sessions = self.sessions.entry(user_id).or_default();
        let first = sessions.is_empty();
        let inserted = sessions.insert(session_id.to_string());
        if first && inserted {
            self.statuses.insert(user_id, PresenceStatus::Online);
        }
        Ok(first && inserted)
    }

    async fn unregister(&self, user_id: Snowflake, session_id: &str) -> RepoResult<bool> {
        let Entry::Occupied(mut sessions) = self.sessions.entry(user_id) else {
            return Ok(false);
        };
        let last = sessions.get_mut().remove(session_id) && sessions.get().is_empty();
        if last {
            self.statuses.remove(&user_id);
            sessions.remove();
        }
        Ok(last)
    }

    async fn sessions(&self, user_id: Snowflake) -> RepoResult<Vec<String>> {
        Ok(self
            .sessions
            .get(&user_id)
            .map(|sessions| sessions.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_status(&self, user_id: Snowflake, status: PresenceStatus) -> RepoResult<()> {
        self.statuses.insert(user_id, status);
        Ok(())
    }

    async fn status(&self, user_id: Snowflake) -> RepoResult<PresenceStatus> {
        let connected = self
            .sessions
            .get(&user_id)
            .is_some_and(|sessions| !sessions.is_empty());
        if !connected {
            return Ok(PresenceStatus::Offline);
        }
        Ok(self
            .statuses
            .get(&user_id)
            .map_or(PresenceStatus::Online, |status| *status))
    }
}
